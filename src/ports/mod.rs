pub mod config_provider;
pub mod worker;

pub use config_provider::ConfigProvider;
pub use worker::Worker;
