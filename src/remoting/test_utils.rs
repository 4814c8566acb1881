use crate::common::Address;
use crate::remoting::{
    ChannelEventListener, Connection, ConnectionId, ConnectionMetadata, MessageCode, RequestCommand, RequestProcessor,
    ResponseCommand, ResponseStatus, Transport, TransportError,
};
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;

pub(crate) fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// Polls `condition` until it holds, failing the test after a sanity timeout.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("Condition never held");
}

pub(crate) struct TestUtilReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Debug> TestUtilReceiver<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        TestUtilReceiver { rx }
    }

    pub(crate) async fn recv(&mut self) -> T {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Expected value")
    }

    pub(crate) async fn recv_assert_timeout(&mut self, timeout: Duration) {
        if let Ok(Some(value)) = tokio::time::timeout(timeout, self.rx.recv()).await {
            panic!("Expected timeout, received {:?}", value);
        }
    }

    pub(crate) async fn assert_nothing_sent(&mut self) {
        self.recv_assert_timeout(Duration::from_millis(20)).await;
    }
}

#[derive(Debug)]
pub(crate) struct SentCommand {
    pub(crate) connection: ConnectionId,
    pub(crate) address: Address,
    pub(crate) command: RequestCommand,
}

#[derive(Clone)]
pub(crate) enum MockReply {
    Respond(ResponseCommand),
    Fail,
    Hang,
}

type Replier = Arc<dyn Fn(&Address, &RequestCommand) -> MockReply + Send + Sync>;

/// ACKs control commands and answers RPC requests with the provider's own address.
pub(crate) fn ack_everything(address: &Address, command: &RequestCommand) -> MockReply {
    let response = match command.message_code {
        MessageCode::RpcRequest => ResponseCommand::new(
            MessageCode::RpcResponse,
            command.serializer,
            command.invoke_id,
            ResponseStatus::Success,
            Bytes::from(address.to_string()),
        ),
        _ => ResponseCommand::ack(command.serializer, command.invoke_id),
    };

    MockReply::Respond(response)
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    address: Address,
    active: AtomicBool,
    metadata: ConnectionMetadata,
    sent: mpsc::UnboundedSender<SentCommand>,
    replier: Replier,
}

impl MockConnection {
    fn with_sender(address: Address, sent: mpsc::UnboundedSender<SentCommand>, replier: Replier) -> Arc<Self> {
        Arc::new(MockConnection {
            id: ConnectionId::next(),
            address,
            active: AtomicBool::new(true),
            metadata: ConnectionMetadata::default(),
            sent,
            replier,
        })
    }

    pub(crate) fn new(
        address: Address,
        replier: impl Fn(&Address, &RequestCommand) -> MockReply + Send + Sync + 'static,
    ) -> (Arc<Self>, TestUtilReceiver<SentCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(address, tx, Arc::new(replier)), TestUtilReceiver::new(rx))
    }

    pub(crate) fn acking(address: Address) -> (Arc<Self>, TestUtilReceiver<SentCommand>) {
        Self::new(address, ack_everything)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_address(&self) -> &Address {
        &self.address
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    async fn invoke(&self, command: RequestCommand) -> Result<ResponseCommand, TransportError> {
        let reply = (self.replier)(&self.address, &command);
        let _ = self.sent.send(SentCommand {
            connection: self.id,
            address: self.address.clone(),
            command,
        });

        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail => Err(TransportError::ChannelClosed(self.address.clone())),
            MockReply::Hang => std::future::pending().await,
        }
    }

    fn close(&self) {
        self.set_active(false);
    }
}

/// MockTransport dials MockConnections that all report into one receiver.
pub(crate) struct MockTransport {
    replier: Replier,
    sent_tx: mpsc::UnboundedSender<SentCommand>,
    sent_rx: Mutex<Option<mpsc::UnboundedReceiver<SentCommand>>>,
    connect_count: AtomicUsize,
    refuse_connections: AtomicBool,
    connect_delay: Mutex<Duration>,
    processor: Mutex<Option<Arc<dyn RequestProcessor>>>,
    listener: Mutex<Option<Arc<dyn ChannelEventListener>>>,
}

impl MockTransport {
    pub(crate) fn new(replier: impl Fn(&Address, &RequestCommand) -> MockReply + Send + Sync + 'static) -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        MockTransport {
            replier: Arc::new(replier),
            sent_tx,
            sent_rx: Mutex::new(Some(sent_rx)),
            connect_count: AtomicUsize::new(0),
            refuse_connections: AtomicBool::new(false),
            connect_delay: Mutex::new(Duration::from_millis(0)),
            processor: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    pub(crate) fn acking() -> Self {
        Self::new(ack_everything)
    }

    /// Can only be taken once.
    pub(crate) fn sent_commands(&self) -> TestUtilReceiver<SentCommand> {
        let rx = self
            .sent_rx
            .lock()
            .expect("MockTransport.sent_rx mutex guard poison")
            .take()
            .expect("sent commands receiver already taken");
        TestUtilReceiver::new(rx)
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Every connect yields for `delay` before dialing.
    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().expect("MockTransport.connect_delay mutex guard poison") = delay;
    }

    pub(crate) fn processor(&self) -> Option<Arc<dyn RequestProcessor>> {
        self.processor.lock().expect("MockTransport.processor mutex guard poison").clone()
    }

    pub(crate) fn listener(&self) -> Option<Arc<dyn ChannelEventListener>> {
        self.listener.lock().expect("MockTransport.listener mutex guard poison").clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &Address, _timeout: Duration) -> Result<Arc<dyn Connection>, TransportError> {
        let delay = *self.connect_delay.lock().expect("MockTransport.connect_delay mutex guard poison");
        if delay > Duration::from_millis(0) {
            tokio::time::sleep(delay).await;
        }
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailure {
                address: address.clone(),
                reason: "refused".into(),
            });
        }
        self.connect_count.fetch_add(1, Ordering::SeqCst);

        let connection = MockConnection::with_sender(address.clone(), self.sent_tx.clone(), self.replier.clone());
        Ok(connection)
    }

    fn register_request_processor(&self, processor: Arc<dyn RequestProcessor>) {
        self.processor
            .lock()
            .expect("MockTransport.processor mutex guard poison")
            .replace(processor);
    }

    fn register_channel_event_listener(&self, listener: Arc<dyn ChannelEventListener>) {
        self.listener
            .lock()
            .expect("MockTransport.listener mutex guard poison")
            .replace(listener);
    }
}
