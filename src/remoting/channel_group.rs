use crate::common::{Address, ServiceIdentity, DEFAULT_SERVICE_WEIGHT};
use crate::remoting::Connection;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// ChannelGroup is the pool of connections to one address. Each service reachable through
/// the address carries its own weight on the group.
pub struct ChannelGroup {
    address: Address,
    // Copy-on-write so `next()` never sees a half-updated pool.
    connections: ArcSwap<Vec<Arc<dyn Connection>>>,
    cursor: AtomicUsize,
    weights: DashMap<ServiceIdentity, u32>,
}

impl ChannelGroup {
    pub fn new(address: Address) -> Self {
        ChannelGroup {
            address,
            connections: ArcSwap::from_pointee(vec![]),
            cursor: AtomicUsize::new(0),
            weights: DashMap::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Returns false if a connection with the same id is already pooled. Pooled
    /// connections that are no longer active are dropped on the way.
    pub fn add(&self, connection: Arc<dyn Connection>) -> bool {
        let mut added = false;
        self.connections.rcu(|current| {
            let mut next: Vec<_> = current.iter().filter(|c| c.is_active()).cloned().collect();
            added = !next.iter().any(|c| c.id() == connection.id());
            if added {
                next.push(connection.clone());
            }
            next
        });

        added
    }

    pub fn remove(&self, connection: &Arc<dyn Connection>) -> bool {
        let mut removed = false;
        self.connections.rcu(|current| {
            let next: Vec<_> = current.iter().filter(|c| c.id() != connection.id()).cloned().collect();
            removed = next.len() != current.len();
            next
        });

        removed
    }

    /// Rotates through the pooled connections, skipping inactive ones.
    pub fn next(&self) -> Option<Arc<dyn Connection>> {
        let connections = self.connections.load();
        if connections.is_empty() {
            return None;
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        (0..connections.len())
            .map(|offset| &connections[(start + offset) % connections.len()])
            .find(|c| c.is_active())
            .cloned()
    }

    pub fn connections(&self) -> Vec<Arc<dyn Connection>> {
        self.connections.load().iter().cloned().collect()
    }

    pub fn is_available(&self) -> bool {
        self.connections.load().iter().any(|c| c.is_active())
    }

    pub fn set_weight(&self, service: &ServiceIdentity, weight: u32) {
        self.weights.insert(service.clone(), weight);
    }

    pub fn weight(&self, service: &ServiceIdentity) -> u32 {
        self.weights
            .get(service)
            .map(|w| *w.value())
            .unwrap_or(DEFAULT_SERVICE_WEIGHT)
    }

    pub(crate) fn remove_weight(&self, service: &ServiceIdentity) {
        self.weights.remove(service);
    }

    /// Closes every pooled connection and empties the pool.
    pub fn close(&self) {
        let connections = self.connections.swap(Arc::new(vec![]));
        for connection in connections.iter() {
            connection.close();
        }
    }
}
