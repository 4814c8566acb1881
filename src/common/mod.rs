mod address;
mod message;
mod meta;

pub use address::Address;
pub use address::AddressError;
pub use message::RegistryMessage;
pub use meta::NotifyEvent;
pub use meta::RegisterMeta;
pub use meta::ServiceIdentity;
pub use meta::SubscribeMeta;
pub use meta::DEFAULT_SERVICE_GROUP;
pub use meta::DEFAULT_SERVICE_VERSION;
pub use meta::DEFAULT_SERVICE_WEIGHT;
