use crate::api::proxy::ServiceProxyBuilder;
use crate::common::{Address, RegisterMeta, ServiceIdentity, SubscribeMeta};
use crate::register::{
    ControlOutcome, NotifyListener, OfflineListener, OfflineListenerId, RegisterClient, RegisterClientError,
};
use crate::remoting::{ChannelGroupRegistry, TransportError};
use crate::serialization::SerializerType;
use std::sync::Arc;
use tokio::time::Duration;

/// LeafClient is the application's handle on the framework, as provider and as consumer.
pub struct LeafClient {
    logger: slog::Logger,
    application: String,
    subscriber_host: String,
    register_client: RegisterClient,
    channel_groups: Arc<ChannelGroupRegistry>,
    serializer: SerializerType,
    invoke_timeout: Duration,
}

impl LeafClient {
    pub(super) fn new(
        logger: slog::Logger,
        application: String,
        subscriber_host: String,
        register_client: RegisterClient,
        channel_groups: Arc<ChannelGroupRegistry>,
        serializer: SerializerType,
        invoke_timeout: Duration,
    ) -> Self {
        LeafClient {
            logger,
            application,
            subscriber_host,
            register_client,
            channel_groups,
            serializer,
            invoke_timeout,
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    /// Publishes a service this process provides.
    pub fn register(&self, meta: RegisterMeta) -> Result<ControlOutcome, RegisterClientError> {
        self.register_client.register(meta)
    }

    pub fn unregister(&self, meta: &RegisterMeta) -> Result<ControlOutcome, RegisterClientError> {
        self.register_client.unregister(meta)
    }

    /// Subscribes to the providers of `service`.
    pub fn subscribe(
        &self,
        service: &ServiceIdentity,
        listener: Arc<dyn NotifyListener>,
    ) -> Result<ControlOutcome, RegisterClientError> {
        let meta = SubscribeMeta::new(service.clone(), self.subscriber_host.clone());
        self.register_client.subscribe(meta, listener)
    }

    /// `listener` fires once when the registry reports `address` offline.
    pub fn offline_listening(&self, address: Address, listener: Arc<dyn OfflineListener>) -> OfflineListenerId {
        self.register_client
            .local_registry()
            .offline_listening(address, listener)
    }

    pub fn cancel_offline_listening(&self, address: &Address, id: OfflineListenerId) -> bool {
        self.register_client
            .local_registry()
            .cancel_offline_listening(address, id)
    }

    /// Opens one more pooled connection to a provider.
    pub async fn connect(&self, address: &Address) -> Result<(), TransportError> {
        self.channel_groups.connect(address).await?;
        Ok(())
    }

    pub fn channel_groups(&self) -> &Arc<ChannelGroupRegistry> {
        &self.channel_groups
    }

    pub fn register_client(&self) -> &RegisterClient {
        &self.register_client
    }

    /// Starts building a proxy for calling `service`.
    pub fn proxy(&self, service: ServiceIdentity) -> ServiceProxyBuilder<'_> {
        ServiceProxyBuilder::new(self, service)
    }

    pub(super) fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    pub(super) fn serializer(&self) -> SerializerType {
        self.serializer
    }

    pub(super) fn invoke_timeout(&self) -> Duration {
        self.invoke_timeout
    }

    /// Stops resending control commands and closes every connection.
    pub fn shutdown(&self) {
        self.register_client.shutdown();
        self.channel_groups.close_all();
        slog::info!(self.logger, "Leaf client shut down");
    }
}
