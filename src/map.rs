use std::sync::Arc;

use serde::Serialize;

use crate::{
    data::{Line, Station, StationId, Ticket},
    network::Network,
    planner::RoutePlanner,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    pub line: Line,
    pub stations: Vec<Arc<Station>>,
}

/// Everything needed to draw the network for one rider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetroMap {
    pub lines: Vec<LineView>,
    pub interchange_names: Vec<String>,
    /// Path of the rider's latest ticket, if it can still be routed.
    pub highlighted: Vec<StationId>,
    pub route_info: String,
}

impl MetroMap {
    pub fn build(network: &Network, planner: &RoutePlanner, latest: Option<&Ticket>) -> Self {
        let lines = network
            .lines()
            .map(|line| LineView {
                line: line.clone(),
                stations: network.stations_on_line(line.id),
            })
            .collect();

        let (highlighted, route_info) = match latest {
            Some(ticket) => (
                planner
                    .find_route(ticket.source.id, ticket.destination.id)
                    .map(|route| route.path.iter().map(|station| station.id).collect())
                    .unwrap_or_default(),
                format!("Highlighting route: {} ➝ {}", ticket.source, ticket.destination),
            ),
            None => (Vec::new(), "No recent ticket found.".to_owned()),
        };

        Self {
            lines,
            interchange_names: network.interchange_names(),
            highlighted,
            route_info,
        }
    }
}
