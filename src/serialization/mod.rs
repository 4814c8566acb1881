mod serializer;
mod wire;

pub use serializer::SerializationError;
pub use serializer::SerializerType;
pub use serializer::WireCodec;
pub(crate) use wire::ProtoRpcRequest;
#[cfg(test)]
pub(crate) use wire::ProtoAddress;
