use crate::common::{Address, NotifyEvent, RegisterMeta, ServiceIdentity};
use crate::register::{LocalRegistry, NotifyListener, OfflineListenerId};
use crate::remoting::{ChannelGroupRegistry, PoolOpening};
use dashmap::DashMap;
use std::sync::Arc;

/// TopologyListener keeps the channel groups of one consumed service in line with what the
/// registry says about its providers.
pub struct TopologyListener {
    logger: slog::Logger,
    service: ServiceIdentity,
    channel_groups: Arc<ChannelGroupRegistry>,
    local_registry: Arc<LocalRegistry>,
    // The offline listener this service holds on each routed address.
    offline_listeners: DashMap<Address, OfflineListenerId>,
}

impl TopologyListener {
    pub fn new(
        logger: slog::Logger,
        service: ServiceIdentity,
        channel_groups: Arc<ChannelGroupRegistry>,
        local_registry: Arc<LocalRegistry>,
    ) -> Self {
        let logger = logger.new(slog::o!("Service" => format!("{:?}", service)));
        TopologyListener {
            logger,
            service,
            channel_groups,
            local_registry,
            offline_listeners: DashMap::new(),
        }
    }

    async fn on_add(&self, meta: RegisterMeta) {
        let address = &meta.address;

        let conn_count = meta.conn_count.max(1);
        match self.channel_groups.open_pool(address, conn_count).await {
            PoolOpening::Existing => {}
            PoolOpening::Opened(opened) => {
                slog::info!(self.logger, "Opened {}/{} connections to {:?}", opened, conn_count, address)
            }
            PoolOpening::Unreachable => return,
        }

        let newly_routed = self.channel_groups.add_channel_group(&self.service, address);
        self.channel_groups
            .group(address)
            .set_weight(&self.service, meta.weight);
        if !newly_routed {
            return;
        }

        let channel_groups = self.channel_groups.clone();
        let service = self.service.clone();
        let offline_address = address.clone();
        let id = self.local_registry.offline_listening(
            address.clone(),
            Arc::new(move || {
                channel_groups.remove_channel_group(&service, &offline_address);
            }),
        );
        if let Some(previous) = self.offline_listeners.insert(address.clone(), id) {
            self.local_registry.cancel_offline_listening(address, previous);
        }
    }

    fn on_remove(&self, meta: &RegisterMeta) {
        if let Some((_, id)) = self.offline_listeners.remove(&meta.address) {
            self.local_registry.cancel_offline_listening(&meta.address, id);
        }
        if !self.channel_groups.remove_channel_group(&self.service, &meta.address) {
            slog::debug!(self.logger, "REMOVE for unknown provider {:?}", meta.address);
        }
    }
}

#[async_trait::async_trait]
impl NotifyListener for TopologyListener {
    async fn notify(&self, meta: RegisterMeta, event: NotifyEvent) {
        match event {
            NotifyEvent::Add => self.on_add(meta).await,
            NotifyEvent::Remove => self.on_remove(&meta),
        }
    }
}
