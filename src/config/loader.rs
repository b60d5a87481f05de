use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat, Map};
use eyre::{Context, Result};

use crate::{
    adapters::config_providers::{CommandLineSource, RegistrationFileSource},
    config::models::Settings,
    core::registration::{BRIDGE_NAME, registration_path},
};

/// Name of the optional settings file inside the data directory
pub const SETTINGS_FILE_NAME: &str = "appsettings.json";

/// Prefix of environment variables, e.g. `HADES__MATRIX__SERVER_URL`
pub const ENV_PREFIX: &str = "HADES";
const ENV_SEPARATOR: &str = "__";

const DATA_DIR_NAME: &str = "data";

/// Resolve the data directory: an explicit override, or `data/` next to the executable.
pub fn resolve_data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    let exe = std::env::current_exe().wrap_err("Failed to locate the running executable")?;
    let base = exe
        .parent()
        .ok_or_else(|| eyre::eyre!("Executable path has no parent: {}", exe.display()))?;
    Ok(base.join(DATA_DIR_NAME))
}

/// Builds [`Settings`] from the layered sources, lowest priority first:
/// serde defaults, `HADES__*` environment variables, `appsettings.json`,
/// the registration file, the command line.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    data_dir: PathBuf,
    command_line: CommandLineSource,
    /// Replaces the process environment when set
    environment: Option<Map<String, String>>,
}

impl ConfigLoader {
    pub fn new(data_dir: impl Into<PathBuf>, command_line: CommandLineSource) -> Self {
        Self {
            data_dir: data_dir.into(),
            command_line,
            environment: None,
        }
    }

    #[cfg(test)]
    fn with_environment(mut self, vars: &[(&str, &str)]) -> Self {
        self.environment = Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn registration_path(&self) -> PathBuf {
        registration_path(&self.data_dir, BRIDGE_NAME)
    }

    pub fn settings_file_present(&self) -> bool {
        self.settings_path().is_file()
    }

    /// Create the data directory if it does not exist yet
    pub fn prepare_data_dir(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            std::fs::create_dir_all(&self.data_dir).with_context(|| {
                format!(
                    "Failed to create data directory {}",
                    self.data_dir.display()
                )
            })?;
        }
        Ok(())
    }

    /// Load the layered configuration
    pub fn load(&self) -> Result<Settings> {
        self.prepare_data_dir()?;

        let mut builder = Config::builder().add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .source(self.environment.clone()),
        );

        let settings_path = self.settings_path();
        if settings_path.is_file() {
            builder = builder.add_source(File::from(settings_path.as_path()).format(FileFormat::Json));
        }

        let settings = builder
            .add_source(RegistrationFileSource::new(self.registration_path()))
            .add_source(self.command_line.clone())
            .build()
            .with_context(|| {
                format!(
                    "Failed to build configuration from {}",
                    self.data_dir.display()
                )
            })?;

        let settings: Settings = settings
            .try_deserialize()
            .wrap_err("Failed to deserialize configuration")?;

        Ok(settings)
    }
}
