use mediagroup::{api::Server, config::Config, Dispatcher};
use tracing::info;

/// The main entry point for the aggregator service.
///
/// Initializes logging, loads the configuration, wires one aggregator into the
/// dispatcher and serves the JSON-RPC API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // First argument overrides the config path.
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&path)?;
    info!("Media group service starting with config: {:?}", config);

    let dispatcher = Dispatcher::from_config(&config.aggregator);
    info!(
        "Aggregating {:?} with a quiet period of {}ms",
        config.aggregator.aggregate_kinds, config.aggregator.timeout_ms
    );

    let server = Server::new(config, dispatcher);
    server.start().await?;

    Ok(())
}
