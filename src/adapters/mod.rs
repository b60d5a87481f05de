pub mod config_providers;
pub mod hades_session;
pub mod seq;
pub mod telnet;

/// Re-export commonly used types from adapters
pub use config_providers::{CommandLineSource, LayeredConfigProvider, RegistrationFileSource};
pub use hades_session::HadesSession;
pub use seq::{SeqHandle, SeqLayer};
pub use telnet::{TelnetFilter, TelnetRelay};
