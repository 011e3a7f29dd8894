use anyhow::Result;
use clap::Args;
use ipo_advisor_core::AppConfig;
use ipo_advisor_web_api::ApiServer;

/// Arguments for the serve command.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Server address, overrides `server.host`/`server.port`
    #[arg(short, long)]
    pub addr: Option<String>,
}

/// Starts the web API on the configured store.
///
/// # Errors
/// Returns an error if the server cannot bind or stops with an error.
pub async fn run_serve(config: &AppConfig, args: ServeArgs) -> Result<()> {
    let addr = args.addr.unwrap_or_else(|| config.server.addr());
    tracing::info!("Starting web API server on {}", addr);

    let server =
        ApiServer::connect(&config.database.url, config.database.max_connections).await;
    server.serve(&addr).await
}
