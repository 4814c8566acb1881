use crate::common::{Address, ServiceIdentity};
use crate::remoting::{ChannelGroup, Connection, Transport, TransportError};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// ChannelGroupRegistry owns every provider connection pool of a consumer, and which
/// services are routed through which pools.
///
/// Topology pushes mutate it from the transport's tasks while callers read it to dispatch,
/// so per-service group lists are swapped in whole and never edited in place.
pub struct ChannelGroupRegistry {
    logger: slog::Logger,
    transport: Arc<dyn Transport>,
    connect_timeout: Duration,
    groups: DashMap<Address, Arc<ChannelGroup>>,
    services: DashMap<ServiceIdentity, Arc<ServiceGroups>>,
    // Held while a pool is being opened, one lock per address.
    opening: DashMap<Address, Arc<Mutex<()>>>,
}

/// Outcome of `ChannelGroupRegistry::open_pool`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PoolOpening {
    /// The address already had an available pool.
    Existing,
    /// This many new connections were pooled.
    Opened(u32),
    /// None of the connection attempts succeeded.
    Unreachable,
}

struct ServiceGroups {
    groups: ArcSwap<Vec<Arc<ChannelGroup>>>,
    cursor: AtomicUsize,
}

impl ServiceGroups {
    fn new() -> Self {
        ServiceGroups {
            groups: ArcSwap::from_pointee(vec![]),
            // Random start so that consumers starting together don't all hit the same provider first.
            cursor: AtomicUsize::new(rand::thread_rng().gen()),
        }
    }

    fn contains(&self, address: &Address) -> bool {
        self.groups.load().iter().any(|g| g.address() == address)
    }
}

impl ChannelGroupRegistry {
    pub fn new(logger: slog::Logger, transport: Arc<dyn Transport>, connect_timeout: Duration) -> Self {
        ChannelGroupRegistry {
            logger,
            transport,
            connect_timeout,
            groups: DashMap::new(),
            services: DashMap::new(),
            opening: DashMap::new(),
        }
    }

    pub fn has_available_channel_group(&self, address: &Address) -> bool {
        self.groups
            .get(address)
            .map(|g| g.value().is_available())
            .unwrap_or(false)
    }

    /// Returns the pool for `address`, creating an empty one if needed.
    pub fn group(&self, address: &Address) -> Arc<ChannelGroup> {
        self.groups
            .entry(address.clone())
            .or_insert_with(|| Arc::new(ChannelGroup::new(address.clone())))
            .value()
            .clone()
    }

    /// Opens one more pooled connection to `address`.
    pub async fn connect(&self, address: &Address) -> Result<Arc<dyn Connection>, TransportError> {
        let connection = self.transport.connect(address, self.connect_timeout).await?;
        self.group(address).add(connection.clone());
        slog::debug!(self.logger, "Opened {:?} to {:?}", connection.id(), address);

        Ok(connection)
    }

    /// Makes sure `address` has an available pool, dialing `conn_count` connections when it
    /// has none. Concurrent calls for the same address dial it once; the later ones find
    /// the pool the first one opened.
    pub async fn open_pool(&self, address: &Address, conn_count: u32) -> PoolOpening {
        let lock = self.opening.entry(address.clone()).or_default().value().clone();

        let outcome = {
            let _opening = lock.lock().await;
            if self.has_available_channel_group(address) {
                PoolOpening::Existing
            } else {
                let mut opened = 0;
                for _ in 0..conn_count {
                    match self.connect(address).await {
                        Ok(_) => opened += 1,
                        Err(e) => slog::warn!(self.logger, "Failed to connect to {:?}: {}", address, e),
                    }
                }
                if opened == 0 {
                    PoolOpening::Unreachable
                } else {
                    PoolOpening::Opened(opened)
                }
            }
        };

        // Only the map and this call still hold the lock when nobody is queued on it.
        self.opening.remove_if(address, |_, l| Arc::strong_count(l) == 2);
        outcome
    }

    /// Routes `service` through the pool of `address`. Returns false if it already was.
    pub fn add_channel_group(&self, service: &ServiceIdentity, address: &Address) -> bool {
        let group = self.group(address);
        let service_groups = self
            .services
            .entry(service.clone())
            .or_insert_with(|| Arc::new(ServiceGroups::new()))
            .value()
            .clone();

        let mut added = false;
        service_groups.groups.rcu(|current| {
            added = !current.iter().any(|g| g.address() == address);
            let mut next: Vec<_> = current.iter().cloned().collect();
            if added {
                next.push(group.clone());
            }
            next
        });

        added
    }

    pub fn contains_channel_group(&self, service: &ServiceIdentity, address: &Address) -> bool {
        self.services
            .get(service)
            .map(|sg| sg.value().contains(address))
            .unwrap_or(false)
    }

    /// Stops routing `service` through `address`. Once no service is routed through the
    /// address, its pool is evicted and closed.
    pub fn remove_channel_group(&self, service: &ServiceIdentity, address: &Address) -> bool {
        let service_groups = match self.services.get(service) {
            Some(sg) => sg.value().clone(),
            None => return false,
        };

        let mut removed = false;
        service_groups.groups.rcu(|current| {
            let next: Vec<_> = current.iter().filter(|g| g.address() != address).cloned().collect();
            removed = next.len() != current.len();
            next
        });

        if removed {
            if let Some(group) = self.groups.get(address).map(|g| g.value().clone()) {
                group.remove_weight(service);
            }
            self.evict_if_unreferenced(address);
            slog::info!(self.logger, "Removed {:?} from {:?}", address, service);
        }

        removed
    }

    /// Closes the pool of `address` and drops it from every service.
    pub fn close_group(&self, address: &Address) {
        for entry in self.services.iter() {
            entry.value().groups.rcu(|current| {
                current
                    .iter()
                    .filter(|g| g.address() != address)
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
        if let Some((_, group)) = self.groups.remove(address) {
            group.close();
        }
    }

    pub fn close_all(&self) {
        let addresses: Vec<Address> = self.groups.iter().map(|e| e.key().clone()).collect();
        for address in addresses {
            self.close_group(&address);
        }
    }

    /// Snapshot of every pool `service` is routed through.
    pub fn groups_for(&self, service: &ServiceIdentity) -> Vec<Arc<ChannelGroup>> {
        match self.services.get(service) {
            Some(sg) => sg.value().groups.load().iter().cloned().collect(),
            None => vec![],
        }
    }

    /// Picks the pool for the next call to `service`. Rotates over the available pools,
    /// each one getting a share of the rotation proportional to its weight for `service`.
    pub fn next_group(&self, service: &ServiceIdentity) -> Option<Arc<ChannelGroup>> {
        let service_groups = self.services.get(service)?.value().clone();

        let available: Vec<(Arc<ChannelGroup>, u32)> = service_groups
            .groups
            .load()
            .iter()
            .filter(|g| g.is_available())
            .map(|g| (g.clone(), g.weight(service)))
            .collect();

        let ticket = service_groups.cursor.fetch_add(1, Ordering::Relaxed);
        select_weighted(&available, ticket).cloned()
    }

    fn evict_if_unreferenced(&self, address: &Address) {
        let evicted = self
            .groups
            .remove_if(address, |_, _| !self.services.iter().any(|sg| sg.value().contains(address)));

        if let Some((_, group)) = evicted {
            group.close();
            slog::info!(self.logger, "Closed pool for {:?}, no service is routed through it", address);
        }
    }
}

fn select_weighted(candidates: &[(Arc<ChannelGroup>, u32)], ticket: usize) -> Option<&Arc<ChannelGroup>> {
    if candidates.is_empty() {
        return None;
    }

    let divisor = candidates.iter().fold(0, |acc, (_, w)| gcd(acc, *w)).max(1);
    let total: usize = candidates.iter().map(|(_, w)| (*w / divisor) as usize).sum();
    if total == 0 {
        return Some(&candidates[ticket % candidates.len()].0);
    }

    let mut point = ticket % total;
    for (group, weight) in candidates {
        let share = (*weight / divisor) as usize;
        if point < share {
            return Some(group);
        }
        point -= share;
    }

    None
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remoting::test_utils::{test_logger, MockTransport};

    fn registry() -> (ChannelGroupRegistry, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::acking());
        let registry = ChannelGroupRegistry::new(test_logger(), transport.clone(), Duration::from_secs(1));
        (registry, transport)
    }

    fn address(port: u16) -> Address {
        Address::new("10.0.0.5", port).unwrap()
    }

    #[tokio::test]
    async fn remove_only_touches_one_service() {
        let (registry, _) = registry();
        let order = ServiceIdentity::with_defaults("Order");
        let stock = ServiceIdentity::with_defaults("Stock");
        registry.connect(&address(8080)).await.unwrap();

        assert!(registry.add_channel_group(&order, &address(8080)));
        assert!(!registry.add_channel_group(&order, &address(8080)));
        assert!(registry.add_channel_group(&stock, &address(8080)));

        assert!(registry.remove_channel_group(&order, &address(8080)));
        assert!(!registry.contains_channel_group(&order, &address(8080)));
        assert!(registry.contains_channel_group(&stock, &address(8080)));
        assert!(registry.has_available_channel_group(&address(8080)));
    }

    #[tokio::test]
    async fn last_remove_evicts_pool() {
        let (registry, _) = registry();
        let order = ServiceIdentity::with_defaults("Order");
        let connection = registry.connect(&address(8080)).await.unwrap();
        registry.add_channel_group(&order, &address(8080));

        assert!(registry.remove_channel_group(&order, &address(8080)));
        assert!(!registry.has_available_channel_group(&address(8080)));
        assert!(!connection.is_active());
        assert!(!registry.remove_channel_group(&order, &address(8080)));
    }

    #[tokio::test]
    async fn weighted_rotation() {
        let (registry, _) = registry();
        let order = ServiceIdentity::with_defaults("Order");
        for port in [8080, 8081].iter() {
            registry.connect(&address(*port)).await.unwrap();
            registry.add_channel_group(&order, &address(*port));
        }
        registry.group(&address(8080)).set_weight(&order, 60);
        registry.group(&address(8081)).set_weight(&order, 40);

        // 60:40 reduces to 3:2, so any 5 consecutive picks are one full rotation.
        let mut picks_8080 = 0;
        for _ in 0..50 {
            if registry.next_group(&order).unwrap().address() == &address(8080) {
                picks_8080 += 1;
            }
        }
        assert_eq!(picks_8080, 30);
    }

    #[tokio::test]
    async fn unavailable_pools_are_skipped() {
        let (registry, _) = registry();
        let order = ServiceIdentity::with_defaults("Order");
        let down = registry.connect(&address(8080)).await.unwrap();
        registry.connect(&address(8081)).await.unwrap();
        registry.add_channel_group(&order, &address(8080));
        registry.add_channel_group(&order, &address(8081));

        down.close();

        for _ in 0..10 {
            assert_eq!(registry.next_group(&order).unwrap().address(), &address(8081));
        }
        assert_eq!(registry.groups_for(&order).len(), 2);
    }

    #[tokio::test]
    async fn concurrent_opens_dial_once() {
        let (registry, transport) = registry();
        transport.set_connect_delay(Duration::from_millis(10));

        let (addr_a, addr_b) = (address(8080), address(8080));
        let (first, second) = tokio::join!(
            registry.open_pool(&addr_a, 2),
            registry.open_pool(&addr_b, 2)
        );

        let mut outcomes = vec![first, second];
        outcomes.sort_by_key(|o| format!("{:?}", o));
        assert_eq!(outcomes, vec![PoolOpening::Existing, PoolOpening::Opened(2)]);
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(registry.group(&address(8080)).connections().len(), 2);
        assert!(registry.opening.is_empty());
    }

    #[tokio::test]
    async fn dead_pool_is_reopened() {
        let (registry, transport) = registry();
        let dead = registry.connect(&address(8080)).await.unwrap();
        dead.close();

        assert_eq!(registry.open_pool(&address(8080), 1).await, PoolOpening::Opened(1));
        assert_eq!(registry.open_pool(&address(8080), 1).await, PoolOpening::Existing);
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(registry.group(&address(8080)).connections().len(), 1);

        transport.refuse_connections(true);
        assert_eq!(registry.open_pool(&address(8081), 3).await, PoolOpening::Unreachable);
    }

    #[test]
    fn zero_weights_fall_back_to_plain_rotation() {
        let groups: Vec<_> = (0..3)
            .map(|i| (Arc::new(ChannelGroup::new(address(9000 + i))), 0))
            .collect();

        let picked: Vec<_> = (0..3)
            .map(|ticket| select_weighted(&groups, ticket).unwrap().address().port())
            .collect();
        assert_eq!(picked, vec![9000, 9001, 9002]);
        assert!(select_weighted(&[], 7).is_none());
    }

    #[test]
    fn unknown_service_has_no_group() {
        let (registry, _) = registry();
        assert!(registry.next_group(&ServiceIdentity::with_defaults("Nope")).is_none());
        assert!(registry.groups_for(&ServiceIdentity::with_defaults("Nope")).is_empty());
    }
}
