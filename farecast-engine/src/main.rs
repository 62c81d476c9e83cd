use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use farecast_core::{DisabledUpstream, SearchRequest};
use farecast_engine::{telemetry, AggregationOrchestrator, EngineState};
use farecast_store::Config;

/// Reads a search request as JSON from stdin and prints the response.
/// An optional first argument scopes the cache entry to a user.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        origin = %config.search.default_origin,
        concurrency = config.fan_out.max_concurrency,
        "Starting farecast"
    );

    // No live provider is bundled; searches are served from the curated catalog
    let state = EngineState::from_config(&config, Arc::new(DisabledUpstream))?;
    let orchestrator = AggregationOrchestrator::new(state);

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read search request from stdin")?;
    let request: SearchRequest = serde_json::from_str(&input).context("Invalid search request JSON")?;
    let user_id = std::env::args().nth(1);

    let response = orchestrator.search(&request, user_id.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    tracing::debug!(health = ?orchestrator.health().await, "Done");
    Ok(())
}
