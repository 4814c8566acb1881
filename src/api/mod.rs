//! The library's client-facing API.
mod client;
mod logging;
mod options;
mod proxy;
mod wiring;

pub use client::LeafClient;
pub use logging::terminal_logger;
pub use options::LeafOptions;
pub use proxy::ServiceProxy;
pub use proxy::ServiceProxyBuilder;
pub use wiring::try_create_leaf_client;
pub use wiring::ClientCreationError;
pub use wiring::LeafClientConfig;
