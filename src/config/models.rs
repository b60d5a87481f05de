//! Configuration data structures for the Hades bridge.
//!
//! These types map directly to the layered configuration (JSON settings file, registration
//! file, command line). Every section carries defaults so that the built-in values form the
//! lowest-priority layer and a minimal settings file stays concise.
use serde::{Deserialize, Serialize};

/// Root of the bridge configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub matrix: MatrixConfig,
    pub hades: HadesConfig,
    pub telnet: TelnetConfig,
    pub database: DatabaseConfig,
    pub seq: SeqConfig,
}

/// Matrix application-service settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MatrixConfig {
    /// Homeserver client-server API base URL
    pub server_url: Option<String>,
    /// Token the bridge presents to the homeserver (`as_token`)
    pub access_token: Option<String>,
    /// Token the homeserver presents to the bridge (`hs_token`)
    pub authorization_token: Option<String>,
    /// Port the application service listens on
    pub listen_port: u16,
    /// Address the application service binds to
    pub bind_address: String,
    /// Localpart of the bridge bot user
    pub bot_localpart: String,
    /// Localpart prefix of puppeted Hades users
    pub user_prefix: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            access_token: None,
            authorization_token: None,
            listen_port: 9000,
            bind_address: "0.0.0.0".to_string(),
            bot_localpart: "hadesbot".to_string(),
            user_prefix: "hades_".to_string(),
        }
    }
}

/// Connection settings for the Hades server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HadesConfig {
    pub server: Option<String>,
    pub port: u16,
    /// Send `username` and `password` right after connecting
    pub auto_login: bool,
    /// Keep the session alive by sending an empty line after a period of silence
    pub prevent_idle: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub idle_interval_secs: u64,
    pub reconnect_max_delay_secs: u64,
}

impl Default for HadesConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: 23,
            auto_login: false,
            prevent_idle: false,
            username: None,
            password: None,
            idle_interval_secs: 240,
            reconnect_max_delay_secs: 60,
        }
    }
}

/// Local telnet relay exposing the Hades session. Disabled when `port` is unset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TelnetConfig {
    pub port: Option<u16>,
    pub bind_address: String,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
}

/// Seq structured log sink
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SeqConfig {
    /// Base URL of the Seq server; shipping is disabled when unset
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    /// Lowest level shipped to Seq and the default console filter
    pub minimum_level: String,
}

impl Default for SeqConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            minimum_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let json = r#"{ "matrix": { "server_url": "https://matrix.example.org" } }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(
            settings.matrix.server_url.as_deref(),
            Some("https://matrix.example.org")
        );
        assert_eq!(settings.matrix.listen_port, 9000);
        assert_eq!(settings.hades.port, 23);
        assert_eq!(settings.seq.minimum_level, "info");
        assert!(settings.telnet.port.is_none());
    }
}
