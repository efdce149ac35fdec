use clap::Parser;
use render_orchestrator::cli::{self, Cli};
use render_orchestrator::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    cli::setup_logging(args.verbose)?;

    info!("starting render-orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    if let Err(e) = cli::run(args, config).await {
        error!(error = %e, "application error");
        std::process::exit(1);
    }

    info!("render-orchestrator stopped");
    Ok(())
}
