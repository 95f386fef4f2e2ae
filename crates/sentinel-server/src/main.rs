//! Standalone entry point. `sentinel-cli`'s `start` subcommand calls
//! [`sentinel_server::serve`] directly; this binary exists for running
//! the server without the CLI wrapper (e.g. in a container `CMD`).

use sentinel_core::SentinelConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SentinelConfig::from_env()?;
    init_tracing(&config.log_level, config.json_logs);

    tracing::info!("sentinel-server starting");
    sentinel_server::serve(config).await
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_new(level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
