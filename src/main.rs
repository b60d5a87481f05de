use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use hades_bridge::{CompositionRoot, Outcome, ShutdownReason, StartupMode, cli::Cli, tracing_setup};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let root = CompositionRoot::assemble(&args)?;
    // Registration generation skips validation, so a bad log level is not fatal there
    let strict = root.mode() == StartupMode::Run;
    let seq_handle = tracing_setup::init_tracing(&root.settings().seq, strict)?;

    if let Some(path) = root.settings_file() {
        tracing::info!("Loaded configuration from {}", path.display());
    }
    tracing::info!("Starting in {:?} mode", root.mode());

    let result = root.execute().await;

    match &result {
        Ok(Outcome::RegistrationGenerated(path)) => {
            tracing::info!("Registration file generated at {}", path.display());
        }
        Ok(Outcome::Stopped(reason)) => {
            tracing::info!("Bridge stopped: {:?}", reason);
        }
        Err(e) => {
            tracing::error!("Bridge terminated with error: {:?}", e);
        }
    }

    tracing_setup::shutdown_tracing(seq_handle).await;
    match result? {
        Outcome::Stopped(ShutdownReason::WorkerFailed(worker)) => {
            Err(eyre!("Hosted worker '{worker}' failed"))
        }
        _ => Ok(()),
    }
}
