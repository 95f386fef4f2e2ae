//! Command-line interface for the threat response pipeline.

use clap::Parser;
use sentinel_core::SentinelConfig;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Autonomous runtime-security response pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Start the ingestion front-end and read API.
    Start,
    /// Validate the environment configuration without starting the server.
    Check,
    /// Print the configuration the process would start with.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Start) => {
            let config = SentinelConfig::from_env()?;
            init_tracing(&config.log_level, config.json_logs);
            tracing::info!("sentinel starting");
            sentinel_server::serve(config).await?;
        }
        Some(Commands::Check) => {
            tracing_subscriber::fmt::init();
            match SentinelConfig::from_env() {
                Ok(_) => println!("configuration OK"),
                Err(err) => {
                    eprintln!("configuration error: {err}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Status) => {
            tracing_subscriber::fmt::init();
            let config = SentinelConfig::from_env()?;
            print_status(&config);
        }
        None => {
            println!("sentinel - use --help for commands");
        }
    }

    Ok(())
}

fn print_status(config: &SentinelConfig) {
    println!("bind address:    {}", config.bind_addr);
    println!(
        "store backing:   {}",
        config.database_url.as_deref().unwrap_or("memory (DATABASE_URL not set)")
    );
    println!(
        "orchestrator:    {}",
        config.orchestrator_url.as_deref().unwrap_or("simulated (ORCHESTRATOR_URL not set)")
    );
    println!("llm provider:    {}", config.llm_provider);
    println!("shutdown grace:  {}s", config.shutdown_grace_secs);
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
