use std::{collections::BTreeMap, sync::Arc};

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;

use crate::data::{Station, StationId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FootfallCounter {
    pub station: Arc<Station>,
    pub date: NaiveDate,
    pub entry_count: u32,
    pub exit_count: u32,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Entry,
    Exit,
}

/// Daily entry/exit counters, one row per station and date.
#[derive(Debug, Default)]
pub struct FootfallStore {
    counters: Mutex<BTreeMap<(NaiveDate, StationId), FootfallCounter>>,
}

impl FootfallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry(&self, station: &Arc<Station>, date: NaiveDate) -> FootfallCounter {
        self.increment(station, date, Direction::Entry)
    }

    pub fn record_exit(&self, station: &Arc<Station>, date: NaiveDate) -> FootfallCounter {
        self.increment(station, date, Direction::Exit)
    }

    pub fn counter(&self, station: StationId, date: NaiveDate) -> Option<FootfallCounter> {
        self.counters.lock().get(&(date, station)).cloned()
    }

    /// All counters of one day, ordered by station id.
    pub fn report(&self, date: NaiveDate) -> Vec<FootfallCounter> {
        self.counters
            .lock()
            .range((date, StationId(u32::MIN))..=(date, StationId(u32::MAX)))
            .map(|(_, counter)| counter.clone())
            .collect()
    }

    fn increment(&self, station: &Arc<Station>, date: NaiveDate, direction: Direction) -> FootfallCounter {
        let mut counters = self.counters.lock();
        let counter = counters
            .entry((date, station.id))
            .or_insert_with(|| FootfallCounter {
                station: Arc::clone(station),
                date,
                entry_count: 0,
                exit_count: 0,
            });
        match direction {
            Direction::Entry => counter.entry_count += 1,
            Direction::Exit => counter.exit_count += 1,
        }
        counter.clone()
    }
}
