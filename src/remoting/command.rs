use crate::serialization::SerializerType;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INVOKE_ID: AtomicU64 = AtomicU64::new(1);

/// InvokeId correlates a request with its eventual response. Ids are unique for the lifetime
/// of the process.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InvokeId(u64);

impl InvokeId {
    pub fn next() -> Self {
        InvokeId(NEXT_INVOKE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(id: u64) -> Self {
        InvokeId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for InvokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum MessageCode {
    RegisterService,
    CancelRegisterService,
    SubscribeService,
    SubscribeReceive,
    OfflineService,
    Ack,
    RpcRequest,
    RpcResponse,
}

impl MessageCode {
    pub fn code(self) -> u8 {
        match self {
            MessageCode::RegisterService => 1,
            MessageCode::CancelRegisterService => 2,
            MessageCode::SubscribeService => 3,
            MessageCode::SubscribeReceive => 4,
            MessageCode::OfflineService => 5,
            MessageCode::Ack => 6,
            MessageCode::RpcRequest => 7,
            MessageCode::RpcResponse => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let message_code = match code {
            1 => MessageCode::RegisterService,
            2 => MessageCode::CancelRegisterService,
            3 => MessageCode::SubscribeService,
            4 => MessageCode::SubscribeReceive,
            5 => MessageCode::OfflineService,
            6 => MessageCode::Ack,
            7 => MessageCode::RpcRequest,
            8 => MessageCode::RpcResponse,
            _ => return None,
        };

        Some(message_code)
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ResponseStatus {
    Success,
    BadRequest,
    ServiceNotFound,
    ServerError,
}

impl ResponseStatus {
    pub fn is_success(self) -> bool {
        self == ResponseStatus::Success
    }
}

/// RequestCommand is one outbound message. Cloning is cheap, the body is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestCommand {
    pub message_code: MessageCode,
    pub serializer: SerializerType,
    pub invoke_id: InvokeId,
    pub body: Bytes,
}

impl RequestCommand {
    /// Creates a request with a fresh invoke id.
    pub fn new(message_code: MessageCode, serializer: SerializerType, body: Bytes) -> Self {
        RequestCommand {
            message_code,
            serializer,
            invoke_id: InvokeId::next(),
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseCommand {
    pub message_code: MessageCode,
    pub serializer: SerializerType,
    pub invoke_id: InvokeId,
    pub status: ResponseStatus,
    pub body: Bytes,
}

impl ResponseCommand {
    pub fn new(
        message_code: MessageCode,
        serializer: SerializerType,
        invoke_id: InvokeId,
        status: ResponseStatus,
        body: Bytes,
    ) -> Self {
        ResponseCommand {
            message_code,
            serializer,
            invoke_id,
            status,
            body,
        }
    }

    /// An empty successful ACK for the request with `invoke_id`.
    pub fn ack(serializer: SerializerType, invoke_id: InvokeId) -> Self {
        Self::new(
            MessageCode::Ack,
            serializer,
            invoke_id,
            ResponseStatus::Success,
            Bytes::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_ids_are_unique() {
        let a = RequestCommand::new(MessageCode::RegisterService, SerializerType::Proto, Bytes::new());
        let b = RequestCommand::new(MessageCode::RegisterService, SerializerType::Proto, Bytes::new());
        assert_ne!(a.invoke_id, b.invoke_id);
        assert!(b.invoke_id > a.invoke_id);
    }

    #[test]
    fn message_codes() {
        for code in 1..=8 {
            let message_code = MessageCode::from_code(code).unwrap();
            assert_eq!(message_code.code(), code);
        }
        assert_eq!(MessageCode::from_code(0), None);
        assert_eq!(MessageCode::from_code(9), None);
    }
}
