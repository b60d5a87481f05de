use std::net::IpAddr;

use tracing_subscriber::filter::LevelFilter;

use crate::config::models::{HadesConfig, MatrixConfig, SeqConfig, Settings, TelnetConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required setting: {field}")]
    MissingField { field: String },

    #[error("Invalid setting '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Validates the settings required before the bridge can run
pub struct SettingsValidator;

impl SettingsValidator {
    /// Validate the entire configuration, reporting every problem at once
    pub fn validate(settings: &Settings) -> ValidationResult<()> {
        let mut errors = Vec::new();

        Self::validate_matrix(&settings.matrix, &mut errors);
        Self::validate_hades(&settings.hades, &mut errors);
        Self::validate_telnet(&settings.telnet, &settings.matrix, &mut errors);
        Self::validate_seq(&settings.seq, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(&errors),
            })
        }
    }

    fn validate_matrix(matrix: &MatrixConfig, errors: &mut Vec<ValidationError>) {
        match non_blank(matrix.server_url.as_deref()) {
            Some(server_url) => {
                if let Err(e) = Self::validate_http_url(server_url, "matrix.server_url") {
                    errors.push(e);
                }
            }
            None => errors.push(missing("matrix.server_url")),
        }

        if non_blank(matrix.access_token.as_deref()).is_none() {
            errors.push(missing("matrix.access_token"));
        }
        if non_blank(matrix.authorization_token.as_deref()).is_none() {
            errors.push(missing("matrix.authorization_token"));
        }

        if matrix.listen_port == 0 {
            errors.push(ValidationError::InvalidField {
                field: "matrix.listen_port".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }
        if matrix.bind_address.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidField {
                field: "matrix.bind_address".to_string(),
                message: format!("'{}' is not an IP address", matrix.bind_address),
            });
        }
    }

    fn validate_hades(hades: &HadesConfig, errors: &mut Vec<ValidationError>) {
        if non_blank(hades.server.as_deref()).is_none() {
            errors.push(missing("hades.server"));
        }
        if hades.port == 0 {
            errors.push(ValidationError::InvalidField {
                field: "hades.port".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        if hades.auto_login {
            if non_blank(hades.username.as_deref()).is_none() {
                errors.push(ValidationError::InvalidField {
                    field: "hades.username".to_string(),
                    message: "Required when hades.auto_login is enabled".to_string(),
                });
            }
            if hades.password.as_deref().is_none_or(str::is_empty) {
                errors.push(ValidationError::InvalidField {
                    field: "hades.password".to_string(),
                    message: "Required when hades.auto_login is enabled".to_string(),
                });
            }
        }

        if hades.prevent_idle && hades.idle_interval_secs == 0 {
            errors.push(ValidationError::InvalidField {
                field: "hades.idle_interval_secs".to_string(),
                message: "Must be greater than 0 when hades.prevent_idle is enabled".to_string(),
            });
        }
    }

    fn validate_telnet(
        telnet: &TelnetConfig,
        matrix: &MatrixConfig,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(port) = telnet.port else {
            return;
        };

        if port == 0 {
            errors.push(ValidationError::InvalidField {
                field: "telnet.port".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        } else if port == matrix.listen_port {
            errors.push(ValidationError::InvalidField {
                field: "telnet.port".to_string(),
                message: format!("Port {port} is already used by matrix.listen_port"),
            });
        }

        if telnet.bind_address.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidField {
                field: "telnet.bind_address".to_string(),
                message: format!("'{}' is not an IP address", telnet.bind_address),
            });
        }
    }

    fn validate_seq(seq: &SeqConfig, errors: &mut Vec<ValidationError>) {
        if let Some(server_url) = non_blank(seq.server_url.as_deref()) {
            if let Err(e) = Self::validate_http_url(server_url, "seq.server_url") {
                errors.push(e);
            }
        }
        if seq.minimum_level.parse::<LevelFilter>().is_err() {
            errors.push(ValidationError::InvalidField {
                field: "seq.minimum_level".to_string(),
                message: format!(
                    "'{}' is not a log level (trace, debug, info, warn, error, off)",
                    seq.minimum_level
                ),
            });
        }
    }

    fn validate_http_url(value: &str, field: &str) -> ValidationResult<()> {
        match url::Url::parse(value) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            Ok(parsed) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("Unsupported scheme '{}', use http or https", parsed.scheme()),
            }),
            Err(e) => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("'{value}' is not a valid URL: {e}"),
            }),
        }
    }

    fn format_multiple_errors(errors: &[ValidationError]) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

fn missing(field: &str) -> ValidationError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
