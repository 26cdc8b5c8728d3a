use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;

use crate::{
    data::{Line, LineId, Station, StationId},
    network::Network,
};

/// Immutable adjacency snapshot of a [`Network`].
///
/// Neighbors of a station are its physical neighbors on the same line
/// (previous stop first, then next stop) followed by the stations of other
/// lines sharing its name, ordered by sequence number. Search order depends
/// on this enumeration order.
#[derive(Debug, Default)]
pub struct NetworkGraph {
    lines: HashMap<LineId, Line>,
    stations: HashMap<StationId, Arc<Station>>,
    adjacency: HashMap<StationId, Vec<Arc<Station>>>,
}

impl NetworkGraph {
    pub fn build(network: &Network) -> Self {
        let by_position: HashMap<(LineId, u32), Arc<Station>> = network
            .stations()
            .map(|station| ((station.line_id, station.sequence_number), Arc::clone(station)))
            .collect();

        let by_name = network
            .stations()
            .into_group_map_by(|station| station.name_key());

        let adjacency: HashMap<StationId, Vec<Arc<Station>>> = network
            .stations()
            .map(|station| {
                let physical = [
                    station.sequence_number.checked_sub(1),
                    station.sequence_number.checked_add(1),
                ]
                .into_iter()
                .flatten()
                .filter_map(|seq| by_position.get(&(station.line_id, seq)))
                .cloned();

                let transfers = by_name
                    .get(&station.name_key())
                    .into_iter()
                    .flatten()
                    .filter(|other| other.line_id != station.line_id)
                    .sorted_by_key(|other| (other.sequence_number, other.id))
                    .map(|other| Arc::clone(*other));

                (station.id, physical.chain(transfers).collect())
            })
            .collect();

        Self {
            lines: network.lines().map(|line| (line.id, line.clone())).collect(),
            stations: network
                .stations()
                .map(|station| (station.id, Arc::clone(station)))
                .collect(),
            adjacency,
        }
    }

    pub fn station(&self, id: StationId) -> Option<&Arc<Station>> {
        self.stations.get(&id)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(&id)
    }

    pub fn neighbors(&self, id: StationId) -> &[Arc<Station>] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
