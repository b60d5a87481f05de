use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{
    config::{DatabaseConfig, MatrixConfig},
    core::registration::{BRIDGE_NAME, Registration},
};

/// Errors raised by the Matrix side of the bridge
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Failed to serialize registration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write registration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Matrix application-service side of the bridge
pub struct MatrixBridge {
    config: MatrixConfig,
    database: DatabaseConfig,
    registration_path: PathBuf,
}

impl MatrixBridge {
    pub fn new(
        config: MatrixConfig,
        database: DatabaseConfig,
        registration_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            database,
            registration_path: registration_path.into(),
        }
    }

    pub fn registration_path(&self) -> &Path {
        &self.registration_path
    }

    pub fn has_database(&self) -> bool {
        self.database
            .connection_string
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    /// The registration document for the current configuration
    pub fn registration(&self) -> Registration {
        Registration::for_bridge(BRIDGE_NAME, &self.config)
    }

    /// Write the registration YAML the homeserver needs to load this bridge
    pub fn generate_registration_file(&self) -> Result<PathBuf, BridgeError> {
        let registration = self.registration();
        let yaml = serde_yaml::to_string(&registration)?;

        if let Some(parent) = self.registration_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BridgeError::Write {
                path: self.registration_path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.registration_path, yaml).map_err(|source| BridgeError::Write {
            path: self.registration_path.clone(),
            source,
        })?;

        tracing::info!(
            "Registration file written to {} (appservice url: {})",
            self.registration_path.display(),
            registration.url
        );
        Ok(self.registration_path.clone())
    }
}
