mod channel_group;
mod channel_group_registry;
mod command;
mod connection;
#[cfg(test)]
pub(crate) mod test_utils;

pub use channel_group::ChannelGroup;
pub use channel_group_registry::ChannelGroupRegistry;
pub use channel_group_registry::PoolOpening;
pub use command::InvokeId;
pub use command::MessageCode;
pub use command::RequestCommand;
pub use command::ResponseCommand;
pub use command::ResponseStatus;
pub use connection::ChannelEventListener;
pub use connection::Connection;
pub use connection::ConnectionId;
pub use connection::ConnectionMetadata;
pub use connection::ProcessError;
pub use connection::RequestProcessor;
pub use connection::Transport;
pub use connection::TransportError;
