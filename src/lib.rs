pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod feed;
pub mod footfall;
pub mod gate;
pub mod graph;
pub mod ledger;
pub mod map;
pub mod network;
pub mod notifier;
pub mod pending;
pub mod planner;
pub mod system;
pub mod wallet;
