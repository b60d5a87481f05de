pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoader, ENV_PREFIX, SETTINGS_FILE_NAME, resolve_data_dir};
pub use models::*;
pub use validation::{SettingsValidator, ValidationError, ValidationResult};

/// Live settings shared with running services and swapped on reload
pub type SettingsHandle = std::sync::Arc<arc_swap::ArcSwap<Settings>>;
