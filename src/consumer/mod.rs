mod call;
mod cluster;
mod dispatcher;
mod topology;

pub use call::Call;
pub use call::RpcRequest;
pub use cluster::ClusterInvoker;
pub use cluster::InvokeFuture;
pub use cluster::Strategy;
pub use cluster::StrategyConfig;
pub use dispatcher::BroadcastDispatcher;
pub use dispatcher::BroadcastReply;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherConfig;
pub use dispatcher::InvokeError;
pub use dispatcher::RoundRobinDispatcher;
pub use topology::TopologyListener;
