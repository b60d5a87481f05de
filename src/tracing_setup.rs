use eyre::{Result, WrapErr};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
    adapters::seq::{SeqHandle, seq_sink},
    config::SeqConfig,
};

/// Parse `seq.minimum_level`. Unless `strict`, an invalid level falls back to
/// `info`; the second value reports whether that happened.
fn resolve_level(seq: &SeqConfig, strict: bool) -> Result<(LevelFilter, bool)> {
    match seq.minimum_level.parse::<LevelFilter>() {
        Ok(level) => Ok((level, false)),
        Err(_) if !strict => Ok((LevelFilter::INFO, true)),
        Err(e) => {
            Err(e).wrap_err_with(|| format!("Invalid log level: {}", seq.minimum_level))
        }
    }
}

/// Initialize console logging plus the optional Seq sink.
///
/// `RUST_LOG` takes precedence over `seq.minimum_level` for the console. Events
/// below `seq.minimum_level` are never shipped to Seq. With `strict` unset an
/// invalid level is replaced by `info` instead of failing. The returned handle
/// must be shut down before exit to flush buffered events.
pub fn init_tracing(seq: &SeqConfig, strict: bool) -> Result<Option<SeqHandle>> {
    let (level, fell_back) = resolve_level(seq, strict)?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    let (seq_layer, handle) = match seq.server_url.as_deref().map(str::trim) {
        Some(server_url) if !server_url.is_empty() => {
            let (layer, handle) = seq_sink(server_url, seq.api_key.clone())?;
            (Some(layer.with_filter(level)), Some(handle))
        }
        _ => (None, None),
    };

    Registry::default()
        .with(fmt_layer.with_filter(env_filter))
        .with(seq_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    match seq.server_url.as_deref() {
        Some(server_url) if handle.is_some() => {
            tracing::info!("Logging initialized, shipping events to Seq at {}", server_url)
        }
        _ => tracing::info!("Logging initialized"),
    }
    if fell_back {
        tracing::warn!(
            "Invalid seq.minimum_level '{}', logging at info",
            seq.minimum_level
        );
    }
    Ok(handle)
}

/// Flush the Seq sink, if any
pub async fn shutdown_tracing(handle: Option<SeqHandle>) {
    tracing::info!("Tracing shutdown initiated");
    if let Some(handle) = handle {
        handle.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_rejects_invalid_level() {
        let seq = SeqConfig {
            minimum_level: "chatty".to_string(),
            ..SeqConfig::default()
        };
        assert!(init_tracing(&seq, true).is_err());
    }

    #[test]
    fn test_lenient_level_falls_back_to_info() {
        let seq = SeqConfig {
            minimum_level: "chatty".to_string(),
            ..SeqConfig::default()
        };
        assert_eq!(resolve_level(&seq, false).unwrap(), (LevelFilter::INFO, true));
        assert!(resolve_level(&seq, true).is_err());

        let seq = SeqConfig {
            minimum_level: "debug".to_string(),
            ..SeqConfig::default()
        };
        assert_eq!(resolve_level(&seq, true).unwrap(), (LevelFilter::DEBUG, false));
    }

    #[tokio::test]
    async fn test_init_tracing_without_seq() {
        // Another test may already have installed the global subscriber
        if let Ok(handle) = init_tracing(&SeqConfig::default(), true) {
            assert!(handle.is_none());
        }
        shutdown_tracing(None).await;
    }
}
