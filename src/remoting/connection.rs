use crate::common::{Address, RegisterMeta, SubscribeMeta};
use crate::remoting::{MessageCode, RequestCommand, ResponseCommand};
use crate::serialization::SerializationError;
use dashmap::DashSet;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection is one pooled transport connection to a remote address. Implemented by the
/// transport collaborator.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn remote_address(&self) -> &Address;

    fn is_active(&self) -> bool;

    /// Per-connection state owned by this library. Implementations hold one
    /// `ConnectionMetadata::default()` for the connection's lifetime.
    fn metadata(&self) -> &ConnectionMetadata;

    /// Sends `command` and resolves with the matching response. Resolves exactly once. No
    /// timeout is applied here, callers wrap this in their own deadline.
    async fn invoke(&self, command: RequestCommand) -> Result<ResponseCommand, TransportError>;

    fn close(&self);
}

/// Transport is the wire-level collaborator: it dials connections and routes inbound
/// requests and connection lifecycle events back into this library.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, address: &Address, timeout: Duration) -> Result<Arc<dyn Connection>, TransportError>;

    /// Installs the handler for requests the remote side initiates.
    fn register_request_processor(&self, processor: Arc<dyn RequestProcessor>);

    fn register_channel_event_listener(&self, listener: Arc<dyn ChannelEventListener>);
}

/// RequestProcessor handles requests initiated by the remote side. An `Err` is a fault for
/// that single request; the transport answers it with a failure response and the
/// connection carries on.
#[async_trait::async_trait]
pub trait RequestProcessor: Send + Sync {
    async fn process(&self, request: RequestCommand) -> Result<ResponseCommand, ProcessError>;
}

pub trait ChannelEventListener: Send + Sync {
    fn on_channel_active(&self, connection: Arc<dyn Connection>);

    fn on_channel_inactive(&self, _connection: Arc<dyn Connection>) {}
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {address:?}: {reason}")]
    ConnectFailure { address: Address, reason: String },
    #[error("Timed out connecting to {0:?}")]
    ConnectTimeout(Address),
    #[error("Connection to {0:?} is closed")]
    ChannelClosed(Address),
    #[error("I/O failure")]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Unsupported message code {0:?}")]
    UnsupportedMessageCode(MessageCode),
    #[error("Failed to decode request body")]
    Serialization(#[from] SerializationError),
}

/// ConnectionMetadata is the record this library keeps on each connection: which provider
/// registrations and consumer subscriptions are currently active over it. Used to skip
/// duplicate control messages, and read back when the connection needs to be replayed.
#[derive(Default)]
pub struct ConnectionMetadata {
    registered: OnceLock<AttachedSet<RegisterMeta>>,
    subscribed: OnceLock<AttachedSet<SubscribeMeta>>,
}

type AttachedSet<T> = DashSet<T>;

impl ConnectionMetadata {
    /// Returns true if `meta` was not attached before.
    pub fn attach_register_meta(&self, meta: &RegisterMeta) -> bool {
        attach(&self.registered, meta)
    }

    /// Returns true if `meta` was attached and is now removed.
    pub fn detach_register_meta(&self, meta: &RegisterMeta) -> bool {
        match self.registered.get() {
            Some(set) => set.remove(meta).is_some(),
            None => false,
        }
    }

    /// Returns true if `meta` was not attached before.
    pub fn attach_subscribe_meta(&self, meta: &SubscribeMeta) -> bool {
        attach(&self.subscribed, meta)
    }

    pub fn is_register_meta_attached(&self, meta: &RegisterMeta) -> bool {
        self.registered.get().map(|set| set.contains(meta)).unwrap_or(false)
    }

    pub fn register_metas(&self) -> Vec<RegisterMeta> {
        snapshot(&self.registered)
    }

    pub fn subscribe_metas(&self) -> Vec<SubscribeMeta> {
        snapshot(&self.subscribed)
    }
}

// `get_or_init` is the set-if-absent: concurrent first users race to initialize, every
// one of them ends up with the winner's set.
fn attach<T: Eq + Hash + Clone>(cell: &OnceLock<AttachedSet<T>>, meta: &T) -> bool {
    cell.get_or_init(DashSet::new).insert(meta.clone())
}

fn snapshot<T: Eq + Hash + Clone>(cell: &OnceLock<AttachedSet<T>>) -> Vec<T> {
    match cell.get() {
        Some(set) => set.iter().map(|m| m.key().clone()).collect(),
        None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ServiceIdentity;

    fn order_meta() -> RegisterMeta {
        RegisterMeta::new(
            ServiceIdentity::with_defaults("Order"),
            Address::new("10.0.0.5", 8080).unwrap(),
        )
    }

    #[test]
    fn register_then_unregister() {
        let metadata = ConnectionMetadata::default();
        let meta = order_meta();

        assert!(metadata.attach_register_meta(&meta));
        assert!(!metadata.attach_register_meta(&meta));
        assert!(metadata.is_register_meta_attached(&meta));

        assert!(metadata.detach_register_meta(&meta));
        assert!(!metadata.is_register_meta_attached(&meta));
        assert!(!metadata.detach_register_meta(&meta));
    }

    #[test]
    fn detach_before_any_attach() {
        let metadata = ConnectionMetadata::default();
        assert!(!metadata.detach_register_meta(&order_meta()));
        assert!(metadata.register_metas().is_empty());
    }

    #[test]
    fn concurrent_first_attach_keeps_one_set() {
        let metadata = Arc::new(ConnectionMetadata::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metadata = metadata.clone();
                std::thread::spawn(move || {
                    let meta = SubscribeMeta::new(ServiceIdentity::with_defaults(format!("S{}", i)), "10.0.0.9");
                    metadata.attach_subscribe_meta(&meta)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(metadata.subscribe_metas().len(), 8);
    }
}
