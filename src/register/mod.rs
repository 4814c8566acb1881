mod local_registry;
mod pending;
mod register_client;
mod request_processor;
mod timers;

pub use local_registry::LocalRegistry;
pub use local_registry::NotifyListener;
pub use local_registry::OfflineListener;
pub use local_registry::OfflineListenerId;
pub use register_client::ControlOutcome;
pub use register_client::RegisterClient;
pub use register_client::RegisterClientConfig;
pub use register_client::RegisterClientError;
pub use request_processor::RegisterClientProcessor;
pub use timers::Clock;
pub use timers::RealClock;
