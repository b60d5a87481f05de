//! Matrix application-service registration document.
use std::{
    net::IpAddr,
    path::{Path, PathBuf},
};

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

use crate::config::MatrixConfig;

/// Identifier of this bridge; names the registration file and the appservice `id`.
pub const BRIDGE_NAME: &str = "hades";

const TOKEN_LENGTH: usize = 64;

/// Path of the registration file for `bridge_name` inside `data_dir`.
pub fn registration_path(data_dir: &Path, bridge_name: &str) -> PathBuf {
    data_dir.join(format!("{bridge_name}-registration.yaml"))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Registration {
    pub id: String,
    pub url: String,
    pub as_token: String,
    pub hs_token: String,
    pub sender_localpart: String,
    #[serde(default)]
    pub rate_limited: bool,
    #[serde(default)]
    pub namespaces: Namespaces,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Namespaces {
    pub users: Vec<Namespace>,
    pub aliases: Vec<Namespace>,
    pub rooms: Vec<Namespace>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Namespace {
    pub exclusive: bool,
    pub regex: String,
}

impl Registration {
    /// Build the registration for `bridge_name` from the Matrix settings.
    ///
    /// Missing tokens are generated, so a freshly written file can be fed back
    /// into the configuration on the next start.
    pub fn for_bridge(bridge_name: &str, config: &MatrixConfig) -> Self {
        Self {
            id: bridge_name.to_string(),
            url: format!("http://{}:{}", url_host(&config.bind_address), config.listen_port),
            as_token: token_or_generate(config.access_token.as_deref()),
            hs_token: token_or_generate(config.authorization_token.as_deref()),
            sender_localpart: config.bot_localpart.clone(),
            rate_limited: false,
            namespaces: Namespaces {
                users: vec![Namespace {
                    exclusive: true,
                    regex: format!("@{}.*", config.user_prefix),
                }],
                aliases: Vec::new(),
                rooms: Vec::new(),
            },
        }
    }
}

/// Host part of the appservice URL. Wildcard binds are reachable as `localhost`.
fn url_host(bind_address: &str) -> String {
    match bind_address.trim().parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => "localhost".to_string(),
        Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
        Ok(IpAddr::V4(ip)) => ip.to_string(),
        Err(_) if bind_address.trim().is_empty() => "localhost".to_string(),
        Err(_) => bind_address.trim().to_string(),
    }
}

fn token_or_generate(token: Option<&str>) -> String {
    match token.map(str::trim) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => generate_token(),
    }
}

/// Random alphanumeric token suitable for `as_token` / `hs_token`.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
