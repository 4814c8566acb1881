use crate::common::{Address, NotifyEvent, RegisterMeta, ServiceIdentity, SubscribeMeta};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// NotifyListener receives the registry's topology changes for a subscribed service.
#[async_trait::async_trait]
pub trait NotifyListener: Send + Sync {
    async fn notify(&self, meta: RegisterMeta, event: NotifyEvent);
}

/// OfflineListener fires once when the registry reports its address offline.
pub trait OfflineListener: Send + Sync {
    fn offline(&self);
}

impl<F: Fn() + Send + Sync> OfflineListener for F {
    fn offline(&self) {
        self()
    }
}

/// Handle to one listener added through `LocalRegistry::offline_listening`.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct OfflineListenerId(u64);

/// LocalRegistry is this process's side of the registry: what it provides, what it
/// subscribed to, and who to tell when the registry pushes a change.
///
/// It survives registry reconnects. Everything held here is replayed onto a new registry
/// connection.
pub struct LocalRegistry {
    logger: slog::Logger,
    register_metas: DashSet<RegisterMeta>,
    subscriptions: DashMap<ServiceIdentity, Subscription>,
    offline_listeners: DashMap<Address, Vec<(OfflineListenerId, Arc<dyn OfflineListener>)>>,
    next_listener_id: AtomicU64,
}

struct Subscription {
    meta: SubscribeMeta,
    listeners: Vec<Arc<dyn NotifyListener>>,
}

impl LocalRegistry {
    pub fn new(logger: slog::Logger) -> Self {
        LocalRegistry {
            logger,
            register_metas: DashSet::new(),
            subscriptions: DashMap::new(),
            offline_listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Returns false if an instance with the same service and address is already held.
    pub fn add_register_meta(&self, meta: RegisterMeta) -> bool {
        self.register_metas.insert(meta)
    }

    pub fn remove_register_meta(&self, meta: &RegisterMeta) -> bool {
        self.register_metas.remove(meta).is_some()
    }

    /// Adds `listener` to the subscription of `meta.service`. Returns true if this is the
    /// first subscription to that service.
    pub fn add_subscription(&self, meta: SubscribeMeta, listener: Arc<dyn NotifyListener>) -> bool {
        let mut first = false;
        self.subscriptions
            .entry(meta.service.clone())
            .or_insert_with(|| {
                first = true;
                Subscription { meta, listeners: vec![] }
            })
            .listeners
            .push(listener);

        first
    }

    pub fn offline_listening(&self, address: Address, listener: Arc<dyn OfflineListener>) -> OfflineListenerId {
        let id = OfflineListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.offline_listeners.entry(address).or_default().push((id, listener));
        id
    }

    /// Drops a listener that has not fired yet. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel_offline_listening(&self, address: &Address, id: OfflineListenerId) -> bool {
        let cancelled = match self.offline_listeners.get_mut(address) {
            Some(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(listener_id, _)| *listener_id != id);
                listeners.len() != before
            }
            None => false,
        };
        self.offline_listeners.remove_if(address, |_, listeners| listeners.is_empty());

        cancelled
    }

    #[cfg(test)]
    pub(crate) fn offline_listener_count(&self, address: &Address) -> usize {
        self.offline_listeners.get(address).map(|l| l.value().len()).unwrap_or(0)
    }

    pub fn register_metas(&self) -> Vec<RegisterMeta> {
        self.register_metas.iter().map(|m| m.key().clone()).collect()
    }

    pub fn subscribe_metas(&self) -> Vec<SubscribeMeta> {
        self.subscriptions.iter().map(|s| s.value().meta.clone()).collect()
    }

    /// Delivers `event` for each meta to the listeners subscribed to the meta's service.
    pub async fn notify(&self, event: NotifyEvent, metas: Vec<RegisterMeta>) {
        for meta in metas {
            // Listeners are cloned out so no map shard stays locked across their awaits.
            let listeners = match self.subscriptions.get(&meta.service) {
                Some(subscription) => subscription.value().listeners.clone(),
                None => {
                    slog::debug!(self.logger, "No subscription for {:?}, dropping {:?}", meta.service, event);
                    continue;
                }
            };

            slog::info!(self.logger, "{:?} {:?} at {:?}", event, meta.service, meta.address);
            for listener in listeners {
                listener.notify(meta.clone(), event).await;
            }
        }
    }

    /// Fires and forgets every offline listener of `address`.
    pub fn offline(&self, address: &Address) {
        let listeners = match self.offline_listeners.remove(address) {
            Some((_, listeners)) => listeners,
            None => return,
        };

        slog::info!(self.logger, "{:?} went offline, firing {} listeners", address, listeners.len());
        for (_, listener) in listeners {
            listener.offline();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remoting::test_utils::{test_logger, TestUtilReceiver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct ChannelListener {
        tx: mpsc::UnboundedSender<(RegisterMeta, NotifyEvent)>,
    }

    #[async_trait::async_trait]
    impl NotifyListener for ChannelListener {
        async fn notify(&self, meta: RegisterMeta, event: NotifyEvent) {
            let _ = self.tx.send((meta, event));
        }
    }

    fn listener() -> (Arc<ChannelListener>, TestUtilReceiver<(RegisterMeta, NotifyEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelListener { tx }), TestUtilReceiver::new(rx))
    }

    fn provider(name: &str) -> RegisterMeta {
        RegisterMeta::new(
            ServiceIdentity::with_defaults(name),
            Address::new("10.0.0.5", 8080).unwrap(),
        )
    }

    #[tokio::test]
    async fn notify_reaches_only_subscribers_of_the_service() {
        let registry = LocalRegistry::new(test_logger());
        let (order_listener, mut order_events) = listener();
        let order = SubscribeMeta::new(ServiceIdentity::with_defaults("Order"), "10.0.0.9");

        assert!(registry.add_subscription(order.clone(), order_listener.clone()));
        assert!(!registry.add_subscription(order, order_listener));

        registry
            .notify(NotifyEvent::Add, vec![provider("Stock"), provider("Order")])
            .await;

        let (meta, event) = order_events.recv().await;
        assert_eq!(meta, provider("Order"));
        assert_eq!(event, NotifyEvent::Add);
        // Second listener registration on the same service.
        assert_eq!(order_events.recv().await.0, provider("Order"));
        order_events.assert_nothing_sent().await;
        assert_eq!(registry.subscribe_metas().len(), 1);
    }

    #[test]
    fn offline_listeners_fire_once() {
        let registry = LocalRegistry::new(test_logger());
        let address = Address::new("10.0.0.5", 8080).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fired = fired.clone();
            registry.offline_listening(
                address.clone(),
                Arc::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        registry.offline(&address);
        registry.offline(&address);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(registry.offline_listener_count(&address), 0);
    }

    #[test]
    fn cancelled_offline_listener_never_fires() {
        let registry = LocalRegistry::new(test_logger());
        let address = Address::new("10.0.0.5", 8080).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = fired.clone();
        let cancelled = registry.offline_listening(
            address.clone(),
            Arc::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let fired_clone = fired.clone();
        registry.offline_listening(
            address.clone(),
            Arc::new(move || {
                fired_clone.fetch_add(10, Ordering::SeqCst);
            }),
        );

        assert!(registry.cancel_offline_listening(&address, cancelled));
        assert!(!registry.cancel_offline_listening(&address, cancelled));
        assert_eq!(registry.offline_listener_count(&address), 1);

        registry.offline(&address);
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn register_metas_are_keyed_by_service_and_address() {
        let registry = LocalRegistry::new(test_logger());
        assert!(registry.add_register_meta(provider("Order").with_weight(60)));
        assert!(!registry.add_register_meta(provider("Order")));
        assert_eq!(registry.register_metas().len(), 1);

        assert!(registry.remove_register_meta(&provider("Order")));
        assert!(registry.register_metas().is_empty());
    }
}
