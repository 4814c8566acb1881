use crate::remoting::{InvokeId, RequestCommand};
use dashmap::DashMap;
use tokio::time::{Duration, Instant};

/// PendingCommands tracks control commands that were sent to the registry and not yet
/// acknowledged, keyed by invoke id.
///
/// Inserted from caller tasks, removed from response tasks and scanned from the resend loop,
/// all concurrently. An ACK racing a resend of the same command is harmless: the resend is
/// redundant and its ACK finds nothing to remove.
#[derive(Default)]
pub(crate) struct PendingCommands {
    commands: DashMap<InvokeId, PendingCommand>,
}

struct PendingCommand {
    command: RequestCommand,
    sent_at: Instant,
}

impl PendingCommands {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, command: RequestCommand, sent_at: Instant) {
        self.commands
            .insert(command.invoke_id, PendingCommand { command, sent_at });
    }

    /// Returns false for an unknown or already acknowledged id.
    pub(crate) fn acknowledge(&self, invoke_id: &InvokeId) -> bool {
        self.commands.remove(invoke_id).is_some()
    }

    /// Returns every command sent more than `grace` before `now`, and marks them as sent at
    /// `now`.
    pub(crate) fn take_due(&self, now: Instant, grace: Duration) -> Vec<RequestCommand> {
        let mut due = vec![];
        for mut entry in self.commands.iter_mut() {
            let pending = entry.value_mut();
            if now.saturating_duration_since(pending.sent_at) > grace {
                pending.sent_at = now;
                due.push(pending.command.clone());
            }
        }

        due
    }

    #[cfg(test)]
    pub(crate) fn sent_at(&self, invoke_id: &InvokeId) -> Option<Instant> {
        self.commands.get(invoke_id).map(|p| p.value().sent_at)
    }

    pub(crate) fn contains(&self, invoke_id: &InvokeId) -> bool {
        self.commands.contains_key(invoke_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }

    pub(crate) fn clear(&self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remoting::MessageCode;
    use crate::serialization::SerializerType;
    use bytes::Bytes;

    fn command() -> RequestCommand {
        RequestCommand::new(
            MessageCode::RegisterService,
            SerializerType::Proto,
            Bytes::from_static(b"meta"),
        )
    }

    #[test]
    fn acknowledge_removes_once() {
        let pending = PendingCommands::new();
        let command = command();
        let invoke_id = command.invoke_id;
        pending.insert(command, Instant::now());

        assert!(pending.acknowledge(&invoke_id));
        assert!(!pending.acknowledge(&invoke_id));
        assert!(!pending.acknowledge(&InvokeId::from_raw(u64::MAX)));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn only_commands_past_grace_are_due() {
        let pending = PendingCommands::new();
        let grace = Duration::from_millis(100);
        let start = Instant::now();

        let old = command();
        let fresh = command();
        pending.insert(old.clone(), start);
        pending.insert(fresh.clone(), start + Duration::from_millis(950));

        let now = start + Duration::from_millis(1000);
        assert_eq!(pending.take_due(now, grace), vec![old.clone()]);
        assert_eq!(pending.sent_at(&old.invoke_id), Some(now));
        assert_eq!(pending.sent_at(&fresh.invoke_id), Some(start + Duration::from_millis(950)));

        // Just resent, so not due again straight away.
        assert!(pending.take_due(now + Duration::from_millis(50), grace).is_empty());
        assert_eq!(pending.len(), 2);
    }
}
