use crate::api::client::LeafClient;
use crate::common::ServiceIdentity;
use crate::consumer::{
    BroadcastDispatcher, Call, ClusterInvoker, Dispatcher, DispatcherConfig, InvokeError, InvokeFuture,
    RoundRobinDispatcher, Strategy, StrategyConfig, TopologyListener,
};
use crate::register::RegisterClientError;
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::Duration;

/// ServiceProxyBuilder configures how calls to one service are made. Building subscribes the
/// client to the service, so its providers get connected as the registry announces them.
pub struct ServiceProxyBuilder<'a> {
    client: &'a LeafClient,
    service: ServiceIdentity,
    timeout: Option<Duration>,
    strategy: StrategyConfig,
}

impl<'a> ServiceProxyBuilder<'a> {
    pub(super) fn new(client: &'a LeafClient, service: ServiceIdentity) -> Self {
        ServiceProxyBuilder {
            client,
            service,
            timeout: None,
            strategy: StrategyConfig::default(),
        }
    }

    /// Per-call timeout. Defaults to the client's invoke timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy.strategy = strategy;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.strategy.retries = retries;
        self
    }

    pub fn build_round_robin(self) -> ServiceProxy<RoundRobinDispatcher> {
        self.build(RoundRobinDispatcher::new)
    }

    pub fn build_broadcast(self) -> ServiceProxy<BroadcastDispatcher> {
        self.build(BroadcastDispatcher::new)
    }

    fn build<D: Dispatcher>(self, create_dispatcher: impl FnOnce(DispatcherConfig) -> D) -> ServiceProxy<D> {
        let client = self.client;
        let logger = client
            .logger()
            .new(slog::o!("Service" => format!("{:?}", self.service)));

        let listener = TopologyListener::new(
            logger.clone(),
            self.service.clone(),
            client.channel_groups().clone(),
            client.register_client().local_registry().clone(),
        );
        match client.subscribe(&self.service, Arc::new(listener)) {
            Ok(_) => {}
            Err(RegisterClientError::NotConnected(address)) => slog::warn!(
                logger,
                "Registry {:?} unreachable, subscription goes out on reconnect",
                address
            ),
        }

        let dispatcher = create_dispatcher(DispatcherConfig {
            info_logger: logger.clone(),
            application: client.application().to_string(),
            channel_groups: client.channel_groups().clone(),
            serializer: client.serializer(),
            timeout: self.timeout.unwrap_or_else(|| client.invoke_timeout()),
        });

        ServiceProxy {
            service: self.service,
            invoker: ClusterInvoker::new(logger, dispatcher, self.strategy),
        }
    }
}

/// ServiceProxy calls one service through a dispatcher and fault strategy.
pub struct ServiceProxy<D> {
    service: ServiceIdentity,
    invoker: ClusterInvoker<D>,
}

impl<D: Dispatcher> ServiceProxy<D> {
    pub fn service(&self) -> &ServiceIdentity {
        &self.service
    }

    pub fn new_call(&self, method: impl Into<String>) -> Call {
        Call::new(self.service.clone(), method)
    }

    pub async fn invoke(&self, call: &Call) -> Result<D::Output, InvokeError> {
        self.invoker.invoke(call).await
    }

    pub fn invoke_async(&self, call: Call) -> InvokeFuture<D::Output> {
        self.invoker.invoke_async(call)
    }
}

impl<D: Dispatcher<Output = Bytes>> ServiceProxy<D> {
    pub async fn invoke_as<M: prost::Message + Default>(&self, call: &Call) -> Result<M, InvokeError> {
        self.invoker.invoke_as(call).await
    }
}
