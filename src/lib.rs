mod api;
mod common;
mod consumer;
mod register;
mod remoting;
mod serialization;

pub use api::terminal_logger;
pub use api::try_create_leaf_client;
pub use api::ClientCreationError;
pub use api::LeafClient;
pub use api::LeafClientConfig;
pub use api::LeafOptions;
pub use api::ServiceProxy;
pub use api::ServiceProxyBuilder;
pub use common::Address;
pub use common::AddressError;
pub use common::NotifyEvent;
pub use common::RegisterMeta;
pub use common::RegistryMessage;
pub use common::ServiceIdentity;
pub use common::SubscribeMeta;
pub use common::DEFAULT_SERVICE_GROUP;
pub use common::DEFAULT_SERVICE_VERSION;
pub use common::DEFAULT_SERVICE_WEIGHT;
pub use consumer::BroadcastDispatcher;
pub use consumer::BroadcastReply;
pub use consumer::Call;
pub use consumer::ClusterInvoker;
pub use consumer::Dispatcher;
pub use consumer::DispatcherConfig;
pub use consumer::InvokeError;
pub use consumer::InvokeFuture;
pub use consumer::RoundRobinDispatcher;
pub use consumer::RpcRequest;
pub use consumer::Strategy;
pub use consumer::StrategyConfig;
pub use consumer::TopologyListener;
pub use register::Clock;
pub use register::ControlOutcome;
pub use register::LocalRegistry;
pub use register::NotifyListener;
pub use register::OfflineListener;
pub use register::OfflineListenerId;
pub use register::RealClock;
pub use register::RegisterClient;
pub use register::RegisterClientConfig;
pub use register::RegisterClientError;
pub use register::RegisterClientProcessor;
pub use remoting::ChannelEventListener;
pub use remoting::ChannelGroup;
pub use remoting::ChannelGroupRegistry;
pub use remoting::Connection;
pub use remoting::ConnectionId;
pub use remoting::ConnectionMetadata;
pub use remoting::InvokeId;
pub use remoting::PoolOpening;
pub use remoting::MessageCode;
pub use remoting::ProcessError;
pub use remoting::RequestCommand;
pub use remoting::RequestProcessor;
pub use remoting::ResponseCommand;
pub use remoting::ResponseStatus;
pub use remoting::Transport;
pub use remoting::TransportError;
pub use serialization::SerializationError;
pub use serialization::SerializerType;
pub use serialization::WireCodec;

// The crate root only declares modules and re-exports. Modules stay private and expose their
// public types through individual `pub use` lines.
