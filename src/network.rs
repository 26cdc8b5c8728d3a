//! Registry of lines and stations: the mutable source data that graph
//! snapshots are built from.

use std::{
    collections::{btree_map::Entry, BTreeMap},
    sync::Arc,
};

use itertools::Itertools;
use tracing::info;

use crate::{
    data::{Line, LineId, Station, StationId},
    error::{FeedError, NetworkError},
    feed,
};

/// Anything that holds references to stations and must keep them alive.
pub trait StationReferences {
    fn references_station(&self, station: StationId) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct Network {
    lines: BTreeMap<LineId, Line>,
    stations: BTreeMap<StationId, Arc<Station>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    pub fn station(&self, id: StationId) -> Option<&Arc<Station>> {
        self.stations.get(&id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Arc<Station>> {
        self.stations.values()
    }

    /// Stations of a line ordered by sequence number.
    pub fn stations_on_line(&self, line: LineId) -> Vec<Arc<Station>> {
        self.stations
            .values()
            .filter(|station| station.line_id == line)
            .sorted_by_key(|station| station.sequence_number)
            .cloned()
            .collect()
    }

    pub fn add_line(&mut self, line: Line) -> Result<(), NetworkError> {
        match self.lines.entry(line.id) {
            Entry::Occupied(_) => Err(NetworkError::DuplicateLine(line.id)),
            Entry::Vacant(slot) => {
                slot.insert(line);
                Ok(())
            }
        }
    }

    pub fn set_line_active(&mut self, line: LineId, is_active: bool) -> Result<(), NetworkError> {
        let line = self.lines.get_mut(&line).ok_or(NetworkError::UnknownLine(line))?;
        line.is_active = is_active;
        info!(line = %line.name, is_active, "Line status changed");
        Ok(())
    }

    pub fn add_station(&mut self, station: Station) -> Result<Arc<Station>, NetworkError> {
        if !self.lines.contains_key(&station.line_id) {
            return Err(NetworkError::UnknownLine(station.line_id));
        }
        if self.stations.contains_key(&station.id) {
            return Err(NetworkError::DuplicateStation(station.id));
        }
        if self
            .stations
            .values()
            .any(|s| s.line_id == station.line_id && s.sequence_number == station.sequence_number)
        {
            return Err(NetworkError::SequenceTaken {
                line_id: station.line_id,
                sequence_number: station.sequence_number,
            });
        }

        let station = Arc::new(station);
        self.stations.insert(station.id, Arc::clone(&station));
        Ok(station)
    }

    /// Removes a station unless something still references it.
    pub fn remove_station(
        &mut self,
        id: StationId,
        references: &dyn StationReferences,
    ) -> Result<Arc<Station>, NetworkError> {
        if !self.stations.contains_key(&id) {
            return Err(NetworkError::UnknownStation(id));
        }
        if references.references_station(id) {
            return Err(NetworkError::StationInUse(id));
        }

        let removed = self.stations.remove(&id).ok_or(NetworkError::UnknownStation(id))?;
        info!(station = %removed.name, "Station removed");
        Ok(removed)
    }

    /// Names served by more than one station, i.e. the interchanges.
    pub fn interchange_names(&self) -> Vec<String> {
        self.stations
            .values()
            .into_group_map_by(|station| station.name_key())
            .into_values()
            .filter(|group| group.len() > 1)
            .map(|group| group[0].name.clone())
            .sorted()
            .collect()
    }
}

impl TryFrom<feed::Feed> for Network {
    type Error = FeedError;

    fn try_from(feed: feed::Feed) -> Result<Self, Self::Error> {
        let mut network = Network::new();

        for line in feed.lines {
            let line_id = line.line_id;
            network
                .add_line(Line {
                    id: LineId(line_id),
                    name: line.line_name,
                    is_active: line.is_active,
                })
                .map_err(|_| FeedError::DuplicateLine(line_id))?;
        }

        for station in feed.stations {
            if !network.lines.contains_key(&LineId(station.line_id)) {
                return Err(FeedError::UnknownLine {
                    station_id: station.station_id,
                    line_id: station.line_id,
                });
            }
            network
                .add_station(Station {
                    id: StationId(station.station_id),
                    name: station.station_name,
                    line_id: LineId(station.line_id),
                    sequence_number: station.sequence_number,
                })
                .map_err(|err| match err {
                    NetworkError::DuplicateStation(id) => FeedError::DuplicateStation(id.0),
                    other => FeedError::Network(other),
                })?;
        }

        info!(
            lines = network.lines.len(),
            stations = network.stations.len(),
            "Network loaded"
        );
        Ok(network)
    }
}
