use std::path::PathBuf;

use clap::Parser;

/// Command-line switches and the configuration keys they set.
pub const SWITCH_MAPPINGS: [(&str, &str); 11] = [
    ("--server-url", "matrix.server_url"),
    ("--access-token", "matrix.access_token"),
    ("--authorization-token", "matrix.authorization_token"),
    ("--port", "matrix.listen_port"),
    ("--bind", "matrix.bind_address"),
    ("--connection-string", "database.connection_string"),
    ("--hades-server", "hades.server"),
    ("--hades-port", "hades.port"),
    ("--hades-auto-login", "hades.auto_login"),
    ("--prevent-idle", "hades.prevent_idle"),
    ("--telnet-port", "telnet.port"),
];

#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about)]
pub struct Cli {
    /// Homeserver URL
    #[clap(long = "server-url")]
    pub server_url: Option<String>,

    /// Application service token (as_token)
    #[clap(long = "access-token")]
    pub access_token: Option<String>,

    /// Homeserver token (hs_token)
    #[clap(long = "authorization-token")]
    pub authorization_token: Option<String>,

    /// Application service listen port
    #[clap(long = "port")]
    pub port: Option<String>,

    /// Application service bind address
    #[clap(long = "bind")]
    pub bind: Option<String>,

    #[clap(long = "connection-string")]
    pub connection_string: Option<String>,

    #[clap(long = "hades-server")]
    pub hades_server: Option<String>,

    #[clap(long = "hades-port")]
    pub hades_port: Option<String>,

    /// Log in automatically after connecting (true/false)
    #[clap(long = "hades-auto-login")]
    pub hades_auto_login: Option<String>,

    /// Keep the Hades session from idling out (true/false)
    #[clap(long = "prevent-idle")]
    pub prevent_idle: Option<String>,

    /// Port of the local telnet relay
    #[clap(long = "telnet-port")]
    pub telnet_port: Option<String>,

    /// Write the appservice registration file and exit
    #[clap(long = "generate-yaml")]
    pub generate_yaml: bool,

    /// Directory holding appsettings.json and the registration file
    #[clap(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Set any configuration key, e.g. `--set seq.server_url=http://seq:5341`
    #[clap(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

impl Cli {
    /// Value passed for one of the mapped switches in [`SWITCH_MAPPINGS`].
    pub fn switch_value(&self, switch: &str) -> Option<&str> {
        let value = match switch {
            "--server-url" => &self.server_url,
            "--access-token" => &self.access_token,
            "--authorization-token" => &self.authorization_token,
            "--port" => &self.port,
            "--bind" => &self.bind,
            "--connection-string" => &self.connection_string,
            "--hades-server" => &self.hades_server,
            "--hades-port" => &self.hades_port,
            "--hades-auto-login" => &self.hades_auto_login,
            "--prevent-idle" => &self.prevent_idle,
            "--telnet-port" => &self.telnet_port,
            _ => return None,
        };
        value.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_every_mapped_switch_is_accepted() {
        let command = Cli::command();
        for (switch, _) in SWITCH_MAPPINGS {
            let long = switch.trim_start_matches("--");
            assert!(
                command.get_arguments().any(|a| a.get_long() == Some(long)),
                "missing clap argument for {switch}"
            );
        }
    }

    #[test]
    fn test_switch_value_reads_parsed_arguments() {
        let cli = Cli::try_parse_from([
            "hades-bridge",
            "--hades-server",
            "hades.example.org",
            "--port=8009",
            "--generate-yaml",
        ])
        .unwrap();

        assert_eq!(cli.switch_value("--hades-server"), Some("hades.example.org"));
        assert_eq!(cli.switch_value("--port"), Some("8009"));
        assert_eq!(cli.switch_value("--telnet-port"), None);
        assert_eq!(cli.switch_value("--unknown"), None);
        assert!(cli.generate_yaml);
    }
}
