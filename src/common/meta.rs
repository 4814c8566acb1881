use crate::common::Address;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const DEFAULT_SERVICE_GROUP: &str = "leaf";
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";
pub const DEFAULT_SERVICE_WEIGHT: u32 = 50;

/// ServiceIdentity (a.k.a. directory) is the routing key for registry lookups and for
/// partitioning channel groups.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ServiceIdentity {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ServiceIdentity {
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        ServiceIdentity {
            group: group.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// A service in the default group and version.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_SERVICE_GROUP, name, DEFAULT_SERVICE_VERSION)
    }
}

impl fmt::Debug for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.name, self.version)
    }
}

/// RegisterMeta is one provider's advertisement of a service instance.
///
/// Identity is `(service, address)`: two advertisements of the same service on the same
/// address are the same instance even if weight or connection count differ. This is what
/// makes unregister find the meta that was registered.
#[derive(Clone, Debug)]
pub struct RegisterMeta {
    pub service: ServiceIdentity,
    pub address: Address,
    pub weight: u32,
    pub conn_count: u32,
}

impl RegisterMeta {
    pub fn new(service: ServiceIdentity, address: Address) -> Self {
        RegisterMeta {
            service,
            address,
            weight: DEFAULT_SERVICE_WEIGHT,
            conn_count: 1,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_conn_count(mut self, conn_count: u32) -> Self {
        self.conn_count = conn_count;
        self
    }
}

impl PartialEq for RegisterMeta {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service && self.address == other.address
    }
}

impl Eq for RegisterMeta {}

impl Hash for RegisterMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash(state);
        self.address.hash(state);
    }
}

/// SubscribeMeta is one consumer's interest in a service.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SubscribeMeta {
    pub service: ServiceIdentity,
    pub subscriber_host: String,
}

impl SubscribeMeta {
    pub fn new(service: ServiceIdentity, subscriber_host: impl Into<String>) -> Self {
        SubscribeMeta {
            service,
            subscriber_host: subscriber_host.into(),
        }
    }
}

/// NotifyEvent is a topology change pushed by the registry for a set of RegisterMetas.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum NotifyEvent {
    Add,
    Remove,
}
