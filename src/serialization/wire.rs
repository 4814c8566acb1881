// Wire messages. Laid out the way prost-build would generate them from a `.proto`, but
// derived by hand so the crate doesn't need protoc at build time.

use std::collections::HashMap;

pub(crate) const PROTO_EVENT_ADD: i32 = 0;
pub(crate) const PROTO_EVENT_REMOVE: i32 = 1;

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoServiceIdentity {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub version: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoAddress {
    #[prost(string, tag = "1")]
    pub host: String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoRegisterMeta {
    #[prost(message, optional, tag = "1")]
    pub service: Option<ProtoServiceIdentity>,
    #[prost(message, optional, tag = "2")]
    pub address: Option<ProtoAddress>,
    #[prost(uint32, tag = "3")]
    pub weight: u32,
    #[prost(uint32, tag = "4")]
    pub conn_count: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoSubscribeMeta {
    #[prost(message, optional, tag = "1")]
    pub service: Option<ProtoServiceIdentity>,
    #[prost(string, tag = "2")]
    pub subscriber_host: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoRegistryMessage {
    #[prost(int32, tag = "1")]
    pub event: i32,
    #[prost(message, repeated, tag = "2")]
    pub register_metas: Vec<ProtoRegisterMeta>,
    #[prost(message, optional, tag = "3")]
    pub address: Option<ProtoAddress>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoRpcRequest {
    #[prost(message, optional, tag = "1")]
    pub service: Option<ProtoServiceIdentity>,
    #[prost(string, tag = "2")]
    pub method: String,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub args: Vec<Vec<u8>>,
    #[prost(map = "string, string", tag = "4")]
    pub attachments: HashMap<String, String>,
    #[prost(string, tag = "5")]
    pub consumer: String,
}
