use config::{ConfigError, Map, Source, Value, ValueKind};
use eyre::{Result, eyre};

use crate::cli::{Cli, SWITCH_MAPPINGS};

const ORIGIN: &str = "command line";

/// Configuration source built from command-line arguments.
///
/// Mapped switches are applied first, followed by `--set KEY=VALUE` pairs in the
/// order given, so a later pair overrides an earlier value for the same key.
#[derive(Debug, Clone, Default)]
pub struct CommandLineSource {
    values: Vec<(String, String)>,
}

impl CommandLineSource {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut values: Vec<(String, String)> = SWITCH_MAPPINGS
            .iter()
            .filter_map(|(switch, key)| {
                cli.switch_value(switch)
                    .map(|value| (key.to_string(), value.to_string()))
            })
            .collect();

        for pair in &cli.overrides {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| eyre!("Invalid --set value '{pair}': expected KEY=VALUE"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(eyre!("Invalid --set value '{pair}': key is empty"));
            }
            values.push((key.to_string(), value.to_string()));
        }

        Ok(Self { values })
    }
}

impl Source for CommandLineSource {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<Map<String, Value>, ConfigError> {
        let origin = ORIGIN.to_string();
        Ok(self
            .values
            .iter()
            .map(|(key, value)| {
                (
                    key.clone(),
                    Value::new(Some(&origin), ValueKind::String(value.clone())),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hades-bridge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_switches_map_to_configuration_keys() {
        let cli = parse(&[
            "--server-url",
            "https://matrix.example.org",
            "--telnet-port",
            "2323",
            "--prevent-idle",
            "true",
        ]);

        let values = CommandLineSource::from_cli(&cli).unwrap().collect().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(
            values["matrix.server_url"].clone().into_string().unwrap(),
            "https://matrix.example.org"
        );
        assert_eq!(values["telnet.port"].clone().into_int().unwrap(), 2323);
        assert!(values["hades.prevent_idle"].clone().into_bool().unwrap());
    }

    #[test]
    fn test_set_overrides_follow_switches() {
        let cli = parse(&[
            "--hades-server",
            "from-switch",
            "--set",
            "hades.server=from-set",
            "--set",
            "seq.api_key=abc=def",
        ]);

        let values = CommandLineSource::from_cli(&cli).unwrap().collect().unwrap();
        assert_eq!(
            values["hades.server"].clone().into_string().unwrap(),
            "from-set"
        );
        assert_eq!(
            values["seq.api_key"].clone().into_string().unwrap(),
            "abc=def"
        );
    }

    #[test]
    fn test_set_without_separator_is_rejected() {
        let cli = parse(&["--set", "hades.server"]);
        assert!(CommandLineSource::from_cli(&cli).is_err());

        let cli = parse(&["--set", "=value"]);
        assert!(CommandLineSource::from_cli(&cli).is_err());
    }

    #[test]
    fn test_no_arguments_is_empty() {
        let source = CommandLineSource::from_cli(&Cli::default()).unwrap();
        assert!(source.collect().unwrap().is_empty());
    }
}
