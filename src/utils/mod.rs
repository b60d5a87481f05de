pub mod backoff;
pub mod graceful_shutdown;

pub use backoff::Backoff;
pub use graceful_shutdown::{GracefulShutdown, ShutdownReason, ShutdownToken};
