pub mod command_line;
pub mod layered;
pub mod registration;

pub use command_line::CommandLineSource;
pub use layered::LayeredConfigProvider;
pub use registration::RegistrationFileSource;
