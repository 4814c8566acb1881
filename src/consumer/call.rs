use crate::common::ServiceIdentity;
use crate::serialization::{ProtoRpcRequest, SerializationError, WireCodec};
use bytes::Bytes;
use std::collections::HashMap;

/// Call is one outbound invocation of `service.method`. Arguments are already encoded by the
/// caller; attachments carry caller context to the provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub service: ServiceIdentity,
    pub method: String,
    pub args: Vec<Bytes>,
    pub attachments: HashMap<String, String>,
}

impl Call {
    pub fn new(service: ServiceIdentity, method: impl Into<String>) -> Self {
        Call {
            service,
            method: method.into(),
            args: vec![],
            attachments: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Encodes `message` as the next argument.
    pub fn with_message_arg<M: prost::Message>(self, message: &M) -> Self {
        self.with_arg(message.encode_to_vec())
    }

    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }
}

/// RpcRequest is the body of an RPC_REQUEST: the call, stamped with the calling application.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcRequest {
    pub consumer: String,
    pub call: Call,
}

// ------- Conversions --------

impl WireCodec for RpcRequest {
    type Proto = ProtoRpcRequest;

    fn to_proto(&self) -> Self::Proto {
        ProtoRpcRequest {
            service: Some(self.call.service.to_proto()),
            method: self.call.method.clone(),
            args: self.call.args.iter().map(|arg| arg.to_vec()).collect(),
            attachments: self.call.attachments.clone(),
            consumer: self.consumer.clone(),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        let service = proto.service.ok_or(SerializationError::MissingField("service"))?;

        Ok(RpcRequest {
            consumer: proto.consumer,
            call: Call {
                service: ServiceIdentity::from_proto(service)?,
                method: proto.method,
                args: proto.args.into_iter().map(Bytes::from).collect(),
                attachments: proto.attachments,
            },
        })
    }
}
