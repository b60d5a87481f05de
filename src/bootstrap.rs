//! Composition root: assembles configuration and services at process start and
//! decides between generating the registration file and running the host.
use std::{path::PathBuf, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use eyre::{Result, WrapErr};
use tokio::task::JoinHandle;

use crate::{
    adapters::config_providers::{CommandLineSource, LayeredConfigProvider},
    cli::Cli,
    config::{ConfigLoader, Settings, SettingsHandle, SettingsValidator, resolve_data_dir},
    core::{HadesBridgeWorker, Host, MatrixBridge},
    ports::{config_provider::ConfigProvider, worker::Worker},
    utils::graceful_shutdown::{GracefulShutdown, ShutdownReason},
};

const RELOAD_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// `--generate-yaml`: write the registration file and exit
    GenerateRegistration,
    /// Validate the configuration and run the host
    Run,
}

impl StartupMode {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.generate_yaml {
            Self::GenerateRegistration
        } else {
            Self::Run
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    RegistrationGenerated(PathBuf),
    Stopped(ShutdownReason),
}

pub struct CompositionRoot {
    mode: StartupMode,
    provider: Arc<LayeredConfigProvider>,
    settings: SettingsHandle,
    bridge: MatrixBridge,
    host: Host,
}

impl CompositionRoot {
    /// Load the layered configuration and construct every service.
    ///
    /// Nothing is logged here; logging is configured from the loaded settings.
    pub fn assemble(cli: &Cli) -> Result<Self> {
        let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
        let loader = ConfigLoader::new(data_dir, CommandLineSource::from_cli(cli)?);
        loader.prepare_data_dir()?;

        let settings = loader.load()?;
        let bridge = MatrixBridge::new(
            settings.matrix.clone(),
            settings.database.clone(),
            loader.registration_path(),
        );
        let settings: SettingsHandle = Arc::new(ArcSwap::from_pointee(settings));

        let mut host = Host::new();
        host.add_worker(Arc::new(HadesBridgeWorker::new(settings.clone())));

        Ok(Self {
            mode: StartupMode::from_cli(cli),
            provider: Arc::new(LayeredConfigProvider::new(loader)),
            settings,
            bridge,
            host,
        })
    }

    pub fn mode(&self) -> StartupMode {
        self.mode
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Path of `appsettings.json` when it contributed to the configuration
    pub fn settings_file(&self) -> Option<PathBuf> {
        let loader = self.provider.loader();
        loader.settings_file_present().then(|| loader.settings_path())
    }

    pub fn bridge(&self) -> &MatrixBridge {
        &self.bridge
    }

    /// Register an additional hosted worker, started after the ones already registered
    pub fn register_worker(&mut self, worker: Arc<dyn Worker>) {
        self.host.add_worker(worker);
    }

    pub fn shutdown_handle(&self) -> Arc<GracefulShutdown> {
        self.host.shutdown_handle()
    }

    pub async fn execute(self) -> Result<Outcome> {
        match self.mode {
            StartupMode::GenerateRegistration => {
                let path = self
                    .bridge
                    .generate_registration_file()
                    .wrap_err("Failed to generate registration file")?;
                Ok(Outcome::RegistrationGenerated(path))
            }
            StartupMode::Run => {
                let settings = self.settings.load_full();
                SettingsValidator::validate(&settings)
                    .wrap_err("Invalid configuration, refusing to start")?;

                if !self.bridge.has_database() {
                    tracing::info!("No database.connection_string configured");
                }

                let reloader = spawn_config_reloader(self.provider.clone(), self.settings.clone());
                let reason = self.host.run().await?;
                if let Some(reloader) = reloader {
                    reloader.abort();
                }
                Ok(Outcome::Stopped(reason))
            }
        }
    }
}

/// Reload the layered settings when a watched file changes.
///
/// Invalid configurations are logged and discarded; the previous settings stay live.
fn spawn_config_reloader(
    provider: Arc<dyn ConfigProvider>,
    settings: SettingsHandle,
) -> Option<JoinHandle<()>> {
    let mut changes = match provider.watch() {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!("Configuration reload disabled: {:?}", e);
            return None;
        }
    };

    Some(tokio::spawn(async move {
        tracing::debug!("Config watcher task started.");
        while changes.recv().await.is_some() {
            // Let editors finish writing before reading the files back
            tokio::time::sleep(RELOAD_DEBOUNCE).await;
            while changes.try_recv().is_ok() {}

            match provider.load_settings().await {
                Ok(new_settings) => match SettingsValidator::validate(&new_settings) {
                    Ok(()) => {
                        settings.store(Arc::new(new_settings));
                        tracing::info!("Configuration reloaded.");
                    }
                    Err(e) => tracing::error!("Ignoring reloaded configuration: {}", e),
                },
                Err(e) => tracing::error!("Failed to reload configuration: {:?}", e),
            }
        }
        tracing::debug!("Config watcher task is shutting down.");
    }))
}
