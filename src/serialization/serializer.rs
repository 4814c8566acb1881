use crate::common::{Address, AddressError, NotifyEvent, RegisterMeta, RegistryMessage, ServiceIdentity, SubscribeMeta};
use crate::serialization::wire::{
    ProtoAddress, ProtoRegisterMeta, ProtoRegistryMessage, ProtoServiceIdentity, ProtoSubscribeMeta, PROTO_EVENT_ADD,
    PROTO_EVENT_REMOVE,
};
use bytes::Bytes;
use prost::Message;

/// SerializerType selects the body format of a command. The code travels in every command
/// header so the receiving side decodes with the same format the sender used.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerializerType {
    Proto,
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Unknown serializer code {0}")]
    UnknownSerializerCode(u8),
    #[error("Failed to decode body")]
    Decode(#[from] prost::DecodeError),
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Illegal value {value} for field '{field}'")]
    IllegalValue { field: &'static str, value: i64 },
    #[error("Invalid address")]
    InvalidAddress(#[from] AddressError),
}

/// WireCodec is implemented by every domain type that crosses the wire. It maps the type to
/// and from its wire message; `SerializerType` turns the wire message into bytes.
pub trait WireCodec: Sized {
    type Proto: Message + Default;

    fn to_proto(&self) -> Self::Proto;
    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError>;
}

impl SerializerType {
    pub fn code(self) -> u8 {
        match self {
            SerializerType::Proto => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, SerializationError> {
        match code {
            1 => Ok(SerializerType::Proto),
            other => Err(SerializationError::UnknownSerializerCode(other)),
        }
    }

    pub fn serialize<T: WireCodec>(self, value: &T) -> Bytes {
        match self {
            SerializerType::Proto => Bytes::from(value.to_proto().encode_to_vec()),
        }
    }

    pub fn deserialize<T: WireCodec>(self, body: &[u8]) -> Result<T, SerializationError> {
        match self {
            SerializerType::Proto => T::from_proto(T::Proto::decode(body)?),
        }
    }
}

impl Default for SerializerType {
    fn default() -> Self {
        SerializerType::Proto
    }
}

// ------- Conversions --------

impl WireCodec for ServiceIdentity {
    type Proto = ProtoServiceIdentity;

    fn to_proto(&self) -> Self::Proto {
        ProtoServiceIdentity {
            group: self.group.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        Ok(ServiceIdentity::new(proto.group, proto.name, proto.version))
    }
}

impl WireCodec for Address {
    type Proto = ProtoAddress;

    fn to_proto(&self) -> Self::Proto {
        ProtoAddress {
            host: self.host().to_string(),
            port: u32::from(self.port()),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        Ok(Address::with_port(proto.host, i64::from(proto.port))?)
    }
}

impl WireCodec for RegisterMeta {
    type Proto = ProtoRegisterMeta;

    fn to_proto(&self) -> Self::Proto {
        ProtoRegisterMeta {
            service: Some(self.service.to_proto()),
            address: Some(self.address.to_proto()),
            weight: self.weight,
            conn_count: self.conn_count,
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        let service = proto.service.ok_or(SerializationError::MissingField("service"))?;
        let address = proto.address.ok_or(SerializationError::MissingField("address"))?;

        Ok(RegisterMeta {
            service: ServiceIdentity::from_proto(service)?,
            address: Address::from_proto(address)?,
            weight: proto.weight,
            conn_count: proto.conn_count,
        })
    }
}

impl WireCodec for SubscribeMeta {
    type Proto = ProtoSubscribeMeta;

    fn to_proto(&self) -> Self::Proto {
        ProtoSubscribeMeta {
            service: Some(self.service.to_proto()),
            subscriber_host: self.subscriber_host.clone(),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        let service = proto.service.ok_or(SerializationError::MissingField("service"))?;

        Ok(SubscribeMeta::new(ServiceIdentity::from_proto(service)?, proto.subscriber_host))
    }
}

impl WireCodec for RegistryMessage {
    type Proto = ProtoRegistryMessage;

    fn to_proto(&self) -> Self::Proto {
        ProtoRegistryMessage {
            event: match self.event {
                NotifyEvent::Add => PROTO_EVENT_ADD,
                NotifyEvent::Remove => PROTO_EVENT_REMOVE,
            },
            register_metas: self.register_metas.iter().map(RegisterMeta::to_proto).collect(),
            address: self.address.as_ref().map(Address::to_proto),
        }
    }

    fn from_proto(proto: Self::Proto) -> Result<Self, SerializationError> {
        let event = match proto.event {
            PROTO_EVENT_ADD => NotifyEvent::Add,
            PROTO_EVENT_REMOVE => NotifyEvent::Remove,
            other => {
                return Err(SerializationError::IllegalValue {
                    field: "event",
                    value: i64::from(other),
                })
            }
        };
        let register_metas = proto
            .register_metas
            .into_iter()
            .map(RegisterMeta::from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let address = match proto.address {
            Some(a) => Some(Address::from_proto(a)?),
            None => None,
        };

        Ok(RegistryMessage {
            event,
            register_metas,
            address,
        })
    }
}
