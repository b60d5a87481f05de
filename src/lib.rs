//! Hades bridge - host for a Matrix application service bridging the Hades telnet server.
//!
//! The crate is the composition root of the bridge: it assembles layered configuration,
//! configures logging, constructs the bridge services explicitly and either writes the
//! appservice registration file or runs the hosted worker until shutdown.
//!
//! # Configuration
//! Sources are applied in increasing priority:
//! 1. built-in defaults
//! 2. environment variables prefixed `HADES__`, sections separated by `__`
//!    (`HADES__MATRIX__SERVER_URL`)
//! 3. `data/appsettings.json` (optional, reloaded on change)
//! 4. `data/hades-registration.yaml` (tokens of a previously generated registration)
//! 5. command-line switches (see [`cli::SWITCH_MAPPINGS`]) and `--set KEY=VALUE`
//!
//! # Quick Example
//! ```no_run
//! use clap::Parser;
//! use hades_bridge::{CompositionRoot, cli::Cli};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cli = Cli::parse();
//! let root = CompositionRoot::assemble(&cli)?;
//! let outcome = root.execute().await?;
//! println!("{outcome:?}");
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the bridge services inside `core`. There is no service locator: [`CompositionRoot`]
//! constructs every service and hands it its settings explicitly.
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error type. A custom error
//! context is attached using `WrapErr` for debuggability.
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    bootstrap::{CompositionRoot, Outcome, StartupMode},
    core::{BRIDGE_NAME, HadesBridgeWorker, Host, MatrixBridge},
    ports::worker::Worker,
    utils::{GracefulShutdown, ShutdownReason},
};
