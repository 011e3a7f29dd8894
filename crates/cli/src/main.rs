use clap::{Parser, Subcommand};
use ipo_advisor_core::{config_loader::DEFAULT_CONFIG_PATH, AppConfig, ConfigLoader};

mod commands;

use commands::{IngestArgs, RunArgs, ServeArgs};

#[derive(Parser)]
#[command(name = "ipo-advisor")]
#[command(about = "Scores upcoming IPOs and publishes INVEST/SKIP recommendations", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Profile overlay, e.g. `prod` reads `Config.prod.toml` on top of the base file
    #[arg(long, global = true, env = "APP_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert scraped rows from a JSON or CSV file into the raw store
    Ingest(IngestArgs),
    /// Score unprocessed rows and publish the predictions
    Score,
    /// Optionally ingest a file, then score
    Run(RunArgs),
    /// Start the web API server
    Serve(ServeArgs),
    /// Print today's deduplicated predictions from the local store
    Today,
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.profile {
        Some(profile) => ConfigLoader::load_with_profile(&cli.config, profile),
        None => ConfigLoader::load_from(&cli.config),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Ingest(args) => {
            commands::run_ingest(&config, &args).await?;
        }
        Commands::Score => {
            commands::run_score(&config).await?;
        }
        Commands::Run(args) => {
            commands::run_pipeline(&config, &args).await?;
        }
        Commands::Serve(args) => {
            commands::run_serve(&config, args).await?;
        }
        Commands::Today => {
            commands::run_today(&config).await?;
        }
    }

    Ok(())
}
