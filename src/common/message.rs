use crate::common::{Address, NotifyEvent, RegisterMeta};

/// RegistryMessage is the body the registry pushes to clients: a topology change for a set
/// of providers (SUBSCRIBE_SERVICE, SUBSCRIBE_RECEIVE) or an address going down
/// (OFFLINE_SERVICE).
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryMessage {
    pub event: NotifyEvent,
    pub register_metas: Vec<RegisterMeta>,
    pub address: Option<Address>,
}

impl RegistryMessage {
    pub fn notify(event: NotifyEvent, register_metas: Vec<RegisterMeta>) -> Self {
        RegistryMessage {
            event,
            register_metas,
            address: None,
        }
    }

    pub fn offline(address: Address) -> Self {
        RegistryMessage {
            event: NotifyEvent::Remove,
            register_metas: vec![],
            address: Some(address),
        }
    }
}
