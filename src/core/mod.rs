pub mod bridge;
pub mod host;
pub mod registration;
pub mod worker;

pub use bridge::{BridgeError, MatrixBridge};
pub use host::Host;
pub use registration::{BRIDGE_NAME, Registration};
pub use worker::HadesBridgeWorker;
