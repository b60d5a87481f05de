use std::{ffi::OsString, sync::Mutex};

use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::{
    config::{loader::ConfigLoader, models::Settings},
    ports::config_provider::ConfigProvider,
};

/// Configuration provider over the layered sources that watches the data directory
/// for changes to the settings file and the registration file.
pub struct LayeredConfigProvider {
    loader: ConfigLoader,
    // Kept alive for as long as the provider exists
    watcher: Mutex<Option<notify::RecommendedWatcher>>,
}

impl LayeredConfigProvider {
    pub fn new(loader: ConfigLoader) -> Self {
        Self {
            loader,
            watcher: Mutex::new(None),
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    fn watched_file_names(&self) -> Result<Vec<OsString>> {
        [self.loader.settings_path(), self.loader.registration_path()]
            .iter()
            .map(|path| {
                path.file_name()
                    .map(|name| name.to_owned())
                    .ok_or_else(|| eyre!("Invalid config path: {}", path.display()))
            })
            .collect()
    }
}

#[async_trait]
impl ConfigProvider for LayeredConfigProvider {
    async fn load_settings(&self) -> Result<Settings> {
        let loader = self.loader.clone();
        tokio::task::spawn_blocking(move || loader.load())
            .await
            .wrap_err("Configuration loading task failed")?
    }

    fn watch(&self) -> Result<mpsc::Receiver<()>> {
        let mut guard = self
            .watcher
            .lock()
            .map_err(|_| eyre!("Config watcher lock poisoned"))?;
        if guard.is_some() {
            return Err(eyre!("Watch can only be called once"));
        }

        let (tx, rx) = mpsc::channel(1);
        let file_names = self.watched_file_names()?;

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if (event.kind.is_modify()
                            || event.kind.is_create()
                            || event.kind.is_remove())
                            && event.paths.iter().any(|p| {
                                p.file_name()
                                    .is_some_and(|name| file_names.iter().any(|f| f == name))
                            })
                        {
                            tracing::debug!("Configuration file changed: {:?}", event.kind);
                            // Channel full means a reload is already pending
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => tracing::error!("File watch error: {:?}", e),
                }
            })?;

        self.loader.prepare_data_dir()?;
        watcher
            .watch(self.loader.data_dir(), RecursiveMode::NonRecursive)
            .wrap_err("Failed to watch data directory")?;

        *guard = Some(watcher);
        Ok(rx)
    }
}
