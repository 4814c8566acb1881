use crate::api::client::LeafClient;
use crate::api::options::LeafOptionsValidated;
use crate::common::Address;
use crate::register::{LocalRegistry, RegisterClient, RegisterClientConfig};
use crate::remoting::{ChannelGroupRegistry, Transport, TransportError};
use crate::LeafOptions;
use std::convert::TryFrom;
use std::sync::Arc;

pub struct LeafClientConfig {
    /// Stamped on every outbound call.
    pub application: String,
    pub registry_address: Address,
    /// Host this process subscribes as.
    pub subscriber_host: String,
    pub transport: Arc<dyn Transport>,
    pub info_logger: slog::Logger,
    pub options: LeafOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientCreationError {
    #[error("Application name must not be empty")]
    EmptyApplication,
    #[error("Illegal options for configuring client: {0}")]
    IllegalClientOptions(String),
    #[error("Failed to connect to registry")]
    RegistryConnection(#[from] TransportError),
}

/// Builds a client and connects it to the registry.
pub async fn try_create_leaf_client(config: LeafClientConfig) -> Result<LeafClient, ClientCreationError> {
    if config.application.is_empty() {
        return Err(ClientCreationError::EmptyApplication);
    }
    let options = LeafOptionsValidated::try_from(config.options)
        .map_err(|e| ClientCreationError::IllegalClientOptions(e.to_string()))?;

    let root_logger = config
        .info_logger
        .new(slog::o!("Application" => config.application.clone()));

    let local_registry = Arc::new(LocalRegistry::new(root_logger.clone()));
    let register_client = RegisterClient::new(RegisterClientConfig {
        info_logger: root_logger.clone(),
        registry_address: config.registry_address,
        transport: config.transport.clone(),
        local_registry,
        serializer: options.serializer,
        invoke_timeout: options.invoke_timeout,
        connect_timeout: options.connect_timeout,
        resend_interval: options.resend_interval,
        resend_initial_delay: options.resend_initial_delay,
        resend_grace: options.resend_grace,
    });
    let channel_groups = Arc::new(ChannelGroupRegistry::new(
        root_logger.clone(),
        config.transport,
        options.connect_timeout,
    ));

    register_client.connect().await?;
    slog::info!(root_logger, "Connected to registry {:?}", register_client.registry_address());

    Ok(LeafClient::new(
        root_logger,
        config.application,
        config.subscriber_host,
        register_client,
        channel_groups,
        options.serializer,
        options.invoke_timeout,
    ))
}
