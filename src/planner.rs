use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::{
    data::{Station, StationId},
    error::RouteError,
    graph::NetworkGraph,
};

pub const DEFAULT_FARE_PER_HOP: Decimal = Decimal::TEN;

/// A priced trip between two stations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub hops: u32,
    pub fare: Decimal,
    pub instructions: Vec<String>,
    pub path: Vec<Arc<Station>>,
}

impl RouteResult {
    /// One-line summary of the line changes, or `Direct Route` when there are none.
    pub fn describe(&self) -> String {
        if self.instructions.is_empty() {
            "Direct Route".to_owned()
        } else {
            self.instructions.join(" -> ")
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutePlanner {
    graph: Arc<NetworkGraph>,
    fare_per_hop: Decimal,
}

impl RoutePlanner {
    pub fn new(graph: Arc<NetworkGraph>, fare_per_hop: Decimal) -> Self {
        Self {
            graph,
            fare_per_hop,
        }
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn fare_per_hop(&self) -> Decimal {
        self.fare_per_hop
    }

    /// Breadth-first search for the path with the fewest edges.
    ///
    /// Every edge costs one step during the search; fewer transfers are not
    /// preferred. The first parent to reach a station is kept, so ties are
    /// settled by the neighbor order of [`NetworkGraph`].
    pub fn find_route(&self, source: StationId, destination: StationId) -> Result<RouteResult, RouteError> {
        let source = self.lookup(source)?;
        let destination = self.lookup(destination)?;

        if source.id == destination.id {
            return Ok(RouteResult {
                hops: 0,
                fare: Decimal::ZERO,
                instructions: Vec::new(),
                path: vec![source],
            });
        }

        let mut parents: HashMap<StationId, Option<Arc<Station>>> = HashMap::from([(source.id, None)]);
        let mut queue = VecDeque::from([Arc::clone(&source)]);
        let mut reached = false;

        while let Some(current) = queue.pop_front() {
            if current.id == destination.id {
                reached = true;
                break;
            }

            for neighbor in self.graph.neighbors(current.id) {
                if !parents.contains_key(&neighbor.id) {
                    parents.insert(neighbor.id, Some(Arc::clone(&current)));
                    queue.push_back(Arc::clone(neighbor));
                }
            }
        }

        if !reached {
            debug!(source = %source, destination = %destination, visited = parents.len(), "No route");
            return Err(RouteError::NotFound {
                source_name: source.name.clone(),
                destination_name: destination.name.clone(),
            });
        }

        let path = Self::reconstruct(&parents, destination);
        let (hops, instructions) = self.walk(&path);
        debug!(source = %source, hops, transfers = instructions.len(), "Route found");

        Ok(RouteResult {
            hops,
            fare: self.fare_per_hop * Decimal::from(hops),
            instructions,
            path,
        })
    }

    fn lookup(&self, id: StationId) -> Result<Arc<Station>, RouteError> {
        self.graph
            .station(id)
            .cloned()
            .ok_or(RouteError::UnknownStation(id))
    }

    fn reconstruct(
        parents: &HashMap<StationId, Option<Arc<Station>>>,
        destination: Arc<Station>,
    ) -> Vec<Arc<Station>> {
        let mut path = vec![];
        let mut current = Some(destination);
        while let Some(station) = current {
            current = parents.get(&station.id).cloned().flatten();
            path.push(station);
        }
        path.reverse();
        path
    }

    /// Counts hops along a path and emits a switch instruction for every
    /// interchange, which costs nothing.
    fn walk(&self, path: &[Arc<Station>]) -> (u32, Vec<String>) {
        let mut hops = 0;
        let mut instructions = vec![];

        for (current, next) in path.iter().zip(path.iter().skip(1)) {
            if current.is_transfer_pair(next) {
                let line_name = self
                    .graph
                    .line(next.line_id)
                    .map(|line| line.name.clone())
                    .unwrap_or_else(|| next.line_id.to_string());
                instructions.push(format!("switch at {} to {}", current.name, line_name));
            } else {
                hops += 1;
            }
        }

        (hops, instructions)
    }
}
