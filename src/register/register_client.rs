use crate::common::{Address, RegisterMeta, RegistryMessage, SubscribeMeta};
use crate::register::pending::PendingCommands;
use crate::register::timers::{Clock, RealClock, ResendTarget, ResendTimerHandle};
use crate::register::{LocalRegistry, NotifyListener, RegisterClientProcessor};
use crate::remoting::{
    ChannelEventListener, ChannelGroup, Connection, InvokeId, MessageCode, RequestCommand, ResponseCommand, Transport,
    TransportError,
};
use crate::serialization::SerializerType;
use bytes::Bytes;
use std::sync::{Arc, Mutex, Weak};
use tokio::time::Duration;

pub struct RegisterClientConfig {
    pub info_logger: slog::Logger,
    pub registry_address: Address,
    pub transport: Arc<dyn Transport>,
    pub local_registry: Arc<LocalRegistry>,
    pub serializer: SerializerType,
    pub invoke_timeout: Duration,
    pub connect_timeout: Duration,
    pub resend_interval: Duration,
    pub resend_initial_delay: Duration,
    pub resend_grace: Duration,
}

/// What a control operation did on the registry connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ControlOutcome {
    /// A command went out and stays pending until the registry ACKs this id.
    Sent(InvokeId),
    AlreadyAttached,
    NotAttached,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterClientError {
    #[error("No active connection to registry {0:?}")]
    NotConnected(Address),
}

/// RegisterClient keeps this process's registrations and subscriptions in sync with the
/// registry.
///
/// Every control command is tracked until the registry acknowledges its invoke id, and a
/// background loop resends whatever is still unacknowledged, forever, at a constant rate.
/// Send failures are therefore only logged. When a registry connection (re)opens, everything
/// held by the `LocalRegistry` is replayed onto it.
pub struct RegisterClient<C: Clock = RealClock> {
    shared: Arc<Shared<C>>,
    resend_timer: Mutex<Option<ResendTimerHandle>>,
}

struct Shared<C> {
    logger: slog::Logger,
    registry_address: Address,
    registry: ChannelGroup,
    transport: Arc<dyn Transport>,
    local_registry: Arc<LocalRegistry>,
    pending: PendingCommands,
    serializer: SerializerType,
    invoke_timeout: Duration,
    connect_timeout: Duration,
    resend_grace: Duration,
    clock: C,
}

/// Registered with the transport. Weak so the transport doesn't keep a shut down client alive.
struct RegistryConnectionWatcher<C> {
    shared: Weak<Shared<C>>,
}

impl RegisterClient {
    /// Starts the resend loop and hooks into `transport`. Must be called from within a tokio
    /// runtime.
    pub fn new(config: RegisterClientConfig) -> Self {
        Self::with_clock(config, RealClock)
    }
}

impl<C: Clock> RegisterClient<C> {
    pub(crate) fn with_clock(config: RegisterClientConfig, clock: C) -> Self {
        let RegisterClientConfig {
            info_logger,
            registry_address,
            transport,
            local_registry,
            serializer,
            invoke_timeout,
            connect_timeout,
            resend_interval,
            resend_initial_delay,
            resend_grace,
        } = config;

        let logger = info_logger.new(slog::o!("Registry" => registry_address.to_string()));
        let shared = Arc::new(Shared {
            logger: logger.clone(),
            registry: ChannelGroup::new(registry_address.clone()),
            registry_address,
            transport: transport.clone(),
            local_registry: local_registry.clone(),
            pending: PendingCommands::new(),
            serializer,
            invoke_timeout,
            connect_timeout,
            resend_grace,
            clock: clock.clone(),
        });

        let resend_timer =
            ResendTimerHandle::spawn_timer_task(Arc::downgrade(&shared), resend_initial_delay, resend_interval, clock);
        transport.register_request_processor(Arc::new(RegisterClientProcessor::new(logger, local_registry)));
        transport.register_channel_event_listener(Arc::new(RegistryConnectionWatcher {
            shared: Arc::downgrade(&shared),
        }));

        RegisterClient {
            shared,
            resend_timer: Mutex::new(Some(resend_timer)),
        }
    }

    /// Opens a registry connection and replays local state onto it.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let connection = self
            .shared
            .transport
            .connect(&self.shared.registry_address, self.shared.connect_timeout)
            .await?;
        self.shared.on_registry_active(connection);

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.shared.registry.is_available()
    }

    pub fn registry_address(&self) -> &Address {
        &self.shared.registry_address
    }

    pub fn local_registry(&self) -> &Arc<LocalRegistry> {
        &self.shared.local_registry
    }

    /// Publishes `meta`. The meta is kept locally even when this returns `NotConnected`, and
    /// goes out once a registry connection opens.
    pub fn register(&self, meta: RegisterMeta) -> Result<ControlOutcome, RegisterClientError> {
        self.shared.local_registry.add_register_meta(meta.clone());
        let connection = self.shared.registry_connection()?;

        Ok(self.shared.register_on(&connection, &meta))
    }

    pub fn unregister(&self, meta: &RegisterMeta) -> Result<ControlOutcome, RegisterClientError> {
        self.shared.local_registry.remove_register_meta(meta);
        let connection = self.shared.registry_connection()?;

        Ok(self.shared.unregister_on(&connection, meta))
    }

    /// Subscribes to `meta.service`. The registry's answer and every later push for the
    /// service go to `listener`.
    pub fn subscribe(
        &self,
        meta: SubscribeMeta,
        listener: Arc<dyn NotifyListener>,
    ) -> Result<ControlOutcome, RegisterClientError> {
        self.shared.local_registry.add_subscription(meta.clone(), listener);
        let connection = self.shared.registry_connection()?;

        Ok(self.shared.subscribe_on(&connection, &meta))
    }

    pub fn pending_commands(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_pending(&self, invoke_id: &InvokeId) -> bool {
        self.shared.pending.contains(invoke_id)
    }

    /// Stops the resend loop and drops every unacknowledged command.
    pub fn shutdown(&self) {
        self.resend_timer
            .lock()
            .expect("RegisterClient.resend_timer mutex guard poison")
            .take();
        self.shared.pending.clear();
        self.shared.registry.close();
        slog::info!(self.shared.logger, "Register client shut down");
    }

    #[cfg(test)]
    fn pending_sent_at(&self, invoke_id: &InvokeId) -> Option<tokio::time::Instant> {
        self.shared.pending.sent_at(invoke_id)
    }
}

impl<C: Clock> Shared<C> {
    fn registry_connection(&self) -> Result<Arc<dyn Connection>, RegisterClientError> {
        self.registry
            .next()
            .ok_or_else(|| RegisterClientError::NotConnected(self.registry_address.clone()))
    }

    fn register_on(self: &Arc<Self>, connection: &Arc<dyn Connection>, meta: &RegisterMeta) -> ControlOutcome {
        if !connection.metadata().attach_register_meta(meta) {
            return ControlOutcome::AlreadyAttached;
        }

        self.track_and_send(connection, MessageCode::RegisterService, self.serializer.serialize(meta))
    }

    fn unregister_on(self: &Arc<Self>, connection: &Arc<dyn Connection>, meta: &RegisterMeta) -> ControlOutcome {
        if !connection.metadata().detach_register_meta(meta) {
            return ControlOutcome::NotAttached;
        }

        self.track_and_send(
            connection,
            MessageCode::CancelRegisterService,
            self.serializer.serialize(meta),
        )
    }

    fn subscribe_on(self: &Arc<Self>, connection: &Arc<dyn Connection>, meta: &SubscribeMeta) -> ControlOutcome {
        if !connection.metadata().attach_subscribe_meta(meta) {
            return ControlOutcome::AlreadyAttached;
        }

        self.track_and_send(connection, MessageCode::SubscribeService, self.serializer.serialize(meta))
    }

    fn track_and_send(self: &Arc<Self>, connection: &Arc<dyn Connection>, code: MessageCode, body: Bytes) -> ControlOutcome {
        let command = RequestCommand::new(code, self.serializer, body);
        let invoke_id = command.invoke_id;

        // Pending before the first send, so an ACK can never arrive ahead of its entry.
        self.pending.insert(command.clone(), self.clock.now());
        self.spawn_send(connection.clone(), command);

        ControlOutcome::Sent(invoke_id)
    }

    fn spawn_send(self: &Arc<Self>, connection: Arc<dyn Connection>, command: RequestCommand) {
        let shared = self.clone();
        tokio::task::spawn(async move {
            shared.send(connection, command).await;
        });
    }

    async fn send(&self, connection: Arc<dyn Connection>, command: RequestCommand) {
        let logger = self.logger.new(slog::o!(
            "InvokeId" => command.invoke_id.as_u64(),
            "Code" => format!("{:?}", command.message_code),
        ));

        match tokio::time::timeout(self.invoke_timeout, connection.invoke(command)).await {
            Ok(Ok(response)) => self.on_response(&logger, response).await,
            Ok(Err(e)) => slog::error!(logger, "Failed to send to registry: {}", e),
            Err(_) => slog::warn!(logger, "No response from registry within {:?}", self.invoke_timeout),
        }
    }

    async fn on_response(&self, logger: &slog::Logger, response: ResponseCommand) {
        match response.message_code {
            MessageCode::Ack => {
                if self.pending.acknowledge(&response.invoke_id) {
                    slog::debug!(logger, "Acknowledged");
                } else {
                    slog::debug!(logger, "Ignoring ACK for unknown invoke id {:?}", response.invoke_id);
                }
            }
            MessageCode::SubscribeReceive if response.status.is_success() => {
                self.pending.acknowledge(&response.invoke_id);
                match response.serializer.deserialize::<RegistryMessage>(&response.body) {
                    Ok(message) => {
                        self.local_registry
                            .notify(message.event, message.register_metas)
                            .await
                    }
                    Err(e) => slog::error!(logger, "Failed to decode subscription result: {}", e),
                }
            }
            MessageCode::SubscribeReceive => {
                slog::warn!(logger, "Subscription answered with {:?}, will resend", response.status);
            }
            other => slog::warn!(logger, "Unexpected {:?} response, command stays pending", other),
        }
    }

    fn on_registry_active(self: &Arc<Self>, connection: Arc<dyn Connection>) {
        if connection.remote_address() != &self.registry_address || !self.registry.add(connection.clone()) {
            return;
        }

        slog::info!(self.logger, "Registry connection {:?} active", connection.id());
        let shared = self.clone();
        tokio::task::spawn(async move {
            shared.replay_on(&connection);
        });
    }

    fn on_registry_inactive(&self, connection: &Arc<dyn Connection>) {
        if self.registry.remove(connection) {
            slog::warn!(self.logger, "Registry connection {:?} went inactive", connection.id());
        }
    }

    fn replay_on(self: &Arc<Self>, connection: &Arc<dyn Connection>) {
        let register_metas = self.local_registry.register_metas();
        let subscribe_metas = self.local_registry.subscribe_metas();
        if register_metas.is_empty() && subscribe_metas.is_empty() {
            return;
        }

        slog::info!(
            self.logger,
            "Replaying {} registrations and {} subscriptions onto {:?}",
            register_metas.len(),
            subscribe_metas.len(),
            connection.id()
        );
        for meta in &register_metas {
            self.register_on(connection, meta);
        }
        for meta in &subscribe_metas {
            self.subscribe_on(connection, meta);
        }
    }
}

impl<C: Clock> ResendTarget for Shared<C> {
    fn resend_due_commands(self: Arc<Self>) {
        let due = self.pending.take_due(self.clock.now(), self.resend_grace);
        if due.is_empty() {
            return;
        }

        let connection = match self.registry.next() {
            Some(connection) => connection,
            None => {
                slog::warn!(self.logger, "{} commands due for resend but the registry is unreachable", due.len());
                return;
            }
        };

        slog::info!(self.logger, "Resending {} unacknowledged commands", due.len());
        for command in due {
            self.spawn_send(connection.clone(), command);
        }
    }
}

impl<C: Clock> ChannelEventListener for RegistryConnectionWatcher<C> {
    fn on_channel_active(&self, connection: Arc<dyn Connection>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_registry_active(connection);
        }
    }

    fn on_channel_inactive(&self, connection: Arc<dyn Connection>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_registry_inactive(&connection);
        }
    }
}
