use crate::common::{Address, ServiceIdentity};
use crate::consumer::{Call, RpcRequest};
use crate::remoting::{
    ChannelGroupRegistry, Connection, MessageCode, RequestCommand, ResponseStatus, TransportError,
};
use crate::serialization::{SerializationError, SerializerType};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::Duration;

/// Dispatcher sends one call to the providers of its service and resolves to their answer.
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn dispatch(&self, call: &Call) -> Result<Self::Output, InvokeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("No available provider for {0:?}")]
    NoAvailableProvider(ServiceIdentity),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Transport failure")]
    Transport(#[from] TransportError),
    #[error("Provider answered {status:?}: {message}")]
    Remote { status: ResponseStatus, message: String },
    #[error("Failed to encode or decode payload")]
    Serialization(#[from] SerializationError),
    #[error("Invocation was cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Whether another attempt, possibly on another provider, could succeed. A provider's
    /// application error would just be raised again.
    pub fn is_retryable(&self) -> bool {
        match self {
            InvokeError::NoAvailableProvider(_) | InvokeError::Timeout(_) | InvokeError::Transport(_) => true,
            InvokeError::Remote { .. } | InvokeError::Serialization(_) | InvokeError::Cancelled => false,
        }
    }
}

#[derive(Clone)]
pub struct DispatcherConfig {
    pub info_logger: slog::Logger,
    pub application: String,
    pub channel_groups: Arc<ChannelGroupRegistry>,
    pub serializer: SerializerType,
    pub timeout: Duration,
}

/// Encoding and sending, shared by both dispatch strategies.
struct DispatchCore {
    logger: slog::Logger,
    application: String,
    channel_groups: Arc<ChannelGroupRegistry>,
    serializer: SerializerType,
    timeout: Duration,
}

impl DispatchCore {
    fn new(config: DispatcherConfig) -> Self {
        DispatchCore {
            logger: config.info_logger,
            application: config.application,
            channel_groups: config.channel_groups,
            serializer: config.serializer,
            timeout: config.timeout,
        }
    }

    fn encode(&self, call: &Call) -> RequestCommand {
        let request = RpcRequest {
            consumer: self.application.clone(),
            call: call.clone(),
        };

        RequestCommand::new(MessageCode::RpcRequest, self.serializer, self.serializer.serialize(&request))
    }

    async fn invoke_on(&self, connection: Arc<dyn Connection>, command: RequestCommand) -> Result<Bytes, InvokeError> {
        let invoke_id = command.invoke_id;
        let response = tokio::time::timeout(self.timeout, connection.invoke(command))
            .await
            .map_err(|_| InvokeError::Timeout(self.timeout))??;

        if !response.status.is_success() {
            let message = String::from_utf8_lossy(&response.body).into_owned();
            slog::debug!(
                self.logger,
                "Call {:?} to {:?} failed with {:?}",
                invoke_id,
                connection.remote_address(),
                response.status
            );
            return Err(InvokeError::Remote {
                status: response.status,
                message,
            });
        }

        Ok(response.body)
    }
}

/// RoundRobinDispatcher sends each call to exactly one provider, rotating over the
/// providers of the service in proportion to their weights.
pub struct RoundRobinDispatcher {
    core: DispatchCore,
}

impl RoundRobinDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        RoundRobinDispatcher {
            core: DispatchCore::new(config),
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for RoundRobinDispatcher {
    type Output = Bytes;

    async fn dispatch(&self, call: &Call) -> Result<Bytes, InvokeError> {
        let connection = self
            .core
            .channel_groups
            .next_group(&call.service)
            .and_then(|group| group.next())
            .ok_or_else(|| InvokeError::NoAvailableProvider(call.service.clone()))?;

        self.core.invoke_on(connection, self.core.encode(call)).await
    }
}

/// One provider's answer to a broadcast call.
#[derive(Debug)]
pub struct BroadcastReply {
    pub address: Address,
    pub result: Result<Bytes, InvokeError>,
}

/// BroadcastDispatcher sends each call to one connection of every provider of the service
/// and waits for all of them. A failing provider fails only its own reply.
pub struct BroadcastDispatcher {
    core: Arc<DispatchCore>,
}

impl BroadcastDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        BroadcastDispatcher {
            core: Arc::new(DispatchCore::new(config)),
        }
    }
}

#[async_trait::async_trait]
impl Dispatcher for BroadcastDispatcher {
    type Output = Vec<BroadcastReply>;

    async fn dispatch(&self, call: &Call) -> Result<Vec<BroadcastReply>, InvokeError> {
        let targets: Vec<(Address, Arc<dyn Connection>)> = self
            .core
            .channel_groups
            .groups_for(&call.service)
            .into_iter()
            .filter_map(|group| group.next().map(|connection| (group.address().clone(), connection)))
            .collect();
        if targets.is_empty() {
            return Err(InvokeError::NoAvailableProvider(call.service.clone()));
        }

        let command = self.core.encode(call);
        let in_flight: Vec<_> = targets
            .into_iter()
            .map(|(address, connection)| {
                let core = self.core.clone();
                let command = command.clone();
                let task = tokio::task::spawn(async move { core.invoke_on(connection, command).await });
                (address, task)
            })
            .collect();

        let mut replies = Vec::with_capacity(in_flight.len());
        for (address, task) in in_flight {
            let result = match task.await {
                Ok(result) => result,
                Err(_) => Err(InvokeError::Cancelled),
            };
            replies.push(BroadcastReply { address, result });
        }

        Ok(replies)
    }
}
