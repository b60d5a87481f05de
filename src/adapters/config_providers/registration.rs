use std::path::PathBuf;

use config::{ConfigError, Map, Source, Value, ValueKind};

use crate::core::registration::Registration;

/// Configuration source backed by the appservice registration file.
///
/// Feeds the tokens and bot localpart of an existing registration back into the
/// `matrix` section. A missing file contributes nothing.
#[derive(Debug, Clone)]
pub struct RegistrationFileSource {
    path: PathBuf,
}

impl RegistrationFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<Option<Registration>, ConfigError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Foreign(Box::new(e)))?;
        let registration = serde_yaml::from_str(&contents).map_err(|e| {
            ConfigError::Message(format!(
                "Failed to parse registration file {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(registration))
    }
}

impl Source for RegistrationFileSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let mut values = Map::new();
        let Some(registration) = self.read()? else {
            return Ok(values);
        };

        let origin = self.path.display().to_string();
        let mut insert = |key: &str, value: String| {
            values.insert(
                key.to_string(),
                Value::new(Some(&origin), ValueKind::String(value)),
            );
        };
        insert("matrix.access_token", registration.as_token);
        insert("matrix.authorization_token", registration.hs_token);
        insert("matrix.bot_localpart", registration.sender_localpart);

        Ok(values)
    }
}
