use crate::common::RegistryMessage;
use crate::register::LocalRegistry;
use crate::remoting::{MessageCode, ProcessError, RequestCommand, RequestProcessor, ResponseCommand};
use std::sync::Arc;

/// RegisterClientProcessor handles the requests the registry pushes over its connection.
pub struct RegisterClientProcessor {
    logger: slog::Logger,
    local_registry: Arc<LocalRegistry>,
}

impl RegisterClientProcessor {
    pub fn new(logger: slog::Logger, local_registry: Arc<LocalRegistry>) -> Self {
        RegisterClientProcessor { logger, local_registry }
    }
}

#[async_trait::async_trait]
impl RequestProcessor for RegisterClientProcessor {
    async fn process(&self, request: RequestCommand) -> Result<ResponseCommand, ProcessError> {
        slog::debug!(
            self.logger,
            "Registry push {:?} with invoke id {:?}",
            request.message_code,
            request.invoke_id
        );

        match request.message_code {
            MessageCode::SubscribeService => {
                let message: RegistryMessage = request.serializer.deserialize(&request.body)?;
                self.local_registry
                    .notify(message.event, message.register_metas)
                    .await;
            }
            MessageCode::OfflineService => {
                let message: RegistryMessage = request.serializer.deserialize(&request.body)?;
                match message.address {
                    Some(address) => self.local_registry.offline(&address),
                    None => slog::warn!(self.logger, "Offline push without an address, ignoring"),
                }
            }
            other => return Err(ProcessError::UnsupportedMessageCode(other)),
        }

        Ok(ResponseCommand::ack(request.serializer, request.invoke_id))
    }
}
