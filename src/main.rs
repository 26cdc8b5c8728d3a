use std::{env, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metro::{
    config::Config,
    data::StationId,
    feed::Feed,
    graph::NetworkGraph,
    network::Network,
    planner::RoutePlanner,
};

fn parse_station(arg: Option<String>) -> anyhow::Result<Option<StationId>> {
    arg.map(|raw| {
        raw.parse()
            .map(StationId)
            .with_context(|| format!("Station id must be a number, got {raw:?}"))
    })
    .transpose()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,metro=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    tracing::info!(dir = %config.feed_dir.display(), "Reading network feed");
    let feed = Feed::from_dir(&config.feed_dir)?;

    let network = Network::try_from(feed)?;
    let planner = RoutePlanner::new(Arc::new(NetworkGraph::build(&network)), config.fare_per_hop);

    let mut args = env::args().skip(1);
    let (Some(source), Some(destination)) = (parse_station(args.next())?, parse_station(args.next())?) else {
        for line in network.lines() {
            let stations = network
                .stations_on_line(line.id)
                .iter()
                .map(|station| format!("{} ({})", station.name, station.id))
                .collect::<Vec<_>>()
                .join(" - ");
            println!("{}: {}", line.name, stations);
        }
        println!("Interchanges: {}", network.interchange_names().join(", "));
        return Ok(());
    };

    let route = planner.find_route(source, destination)?;
    let path = route
        .path
        .iter()
        .map(|station| station.name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ");

    println!("Path: {path}");
    println!("Hops: {}", route.hops);
    println!("Fare: {}", route.fare);
    println!("Route: {}", route.describe());
    Ok(())
}
