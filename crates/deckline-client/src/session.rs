use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use deckline_core::messages::InfoMessage;
use deckline_core::{
    ConnectionError, DeckEvent, InboundMessage, InvocationContext, OutboundMessage, PluginId,
    SettingsSnapshot,
};

use crate::caches::OutboundCaches;
use crate::codec::{self, Envelope, MessageRegistry};
use crate::config::ClientConfig;
use crate::connector::ShortIdMap;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::held::{HeldActionTracker, HeldState};
use crate::pool::InvocationPool;
use crate::registry::HandlerRegistry;

/// Mutable state scoped to one session. Created fresh on every connect so a
/// reconnect never inherits stale caches or hold state.
pub(crate) struct SessionShared {
    pub caches: Arc<OutboundCaches>,
    pub held: Arc<HeldActionTracker>,
    pub short_ids: Arc<ShortIdMap>,
    pub settings: RwLock<SettingsSnapshot>,
    pub info: RwLock<Option<InfoMessage>>,
}

/// One paired TCP connection to the host: the write path, the single read
/// loop, and teardown. Owned by one `DeckClient`; at most one live session
/// per client at a time.
pub struct Session {
    plugin_id: PluginId,
    shared: Arc<SessionShared>,
    dispatcher: Dispatcher,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: parking_lot::Mutex<Option<BufReader<OwnedReadHalf>>>,
    events: mpsc::Sender<DeckEvent>,
    cancel: CancellationToken,
    closed: AtomicBool,
    listening: AtomicBool,
}

impl Session {
    /// Open the TCP stream and assemble the session-scoped machinery. No
    /// traffic is permitted until `pair` has run.
    pub async fn connect(
        config: &ClientConfig,
        registry: Arc<HandlerRegistry>,
        events: mpsc::Sender<DeckEvent>,
    ) -> Result<Arc<Self>, ConnectionError> {
        let addr = config.addr();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ConnectionError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();

        let caches = Arc::new(OutboundCaches::new());
        let held = Arc::new(HeldActionTracker::new());
        let short_ids = Arc::new(ShortIdMap::new());
        let cancel = CancellationToken::new();

        let ctx = InvocationContext {
            plugin_id: config.plugin_id.clone(),
            abort: cancel.child_token(),
        };
        let pool = InvocationPool::new(
            config.parallel_invocations,
            config.invocation_queue,
            ctx,
            Arc::clone(&held),
            cancel.clone(),
        );
        let dispatcher = Dispatcher::new(registry, Arc::clone(&held), Arc::clone(&caches), pool);

        tracing::info!(addr = %addr, plugin_id = %config.plugin_id, "Connected to host");

        Ok(Arc::new(Self {
            plugin_id: config.plugin_id.clone(),
            shared: Arc::new(SessionShared {
                caches,
                held,
                short_ids,
                settings: RwLock::new(SettingsSnapshot::new()),
                info: RwLock::new(None),
            }),
            dispatcher,
            writer: tokio::sync::Mutex::new(Some(write_half)),
            reader: parking_lot::Mutex::new(Some(BufReader::new(read_half))),
            events,
            cancel,
            closed: AtomicBool::new(false),
            listening: AtomicBool::new(false),
        }))
    }

    /// Send the pairing line, identifying this plugin to the host. Must be
    /// the first traffic on the session.
    pub async fn pair(&self) -> Result<(), ConnectionError> {
        let line = codec::encode_line(&OutboundMessage::Pair {
            id: self.plugin_id.clone(),
        })
        .map_err(|e| {
            ConnectionError::Pair(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.write_line(&line).await.map_err(ConnectionError::Pair)?;
        tracing::info!(plugin_id = %self.plugin_id, "Pairing message sent");
        Ok(())
    }

    /// Start the read loop. Exactly one loop runs per session; repeat calls
    /// are no-ops.
    pub fn listen(self: &Arc<Self>) -> bool {
        if self.listening.swap(true, Ordering::SeqCst) {
            return true;
        }
        let Some(reader) = self.reader.lock().take() else {
            return false;
        };
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.read_loop(reader).await;
        });
        true
    }

    async fn read_loop(self: Arc<Self>, reader: BufReader<OwnedReadHalf>) {
        let registry = MessageRegistry::default();
        let mut lines = reader.lines();
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            match next {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if self.route(&registry, &line).await {
                        break;
                    }
                }
                Ok(None) => {
                    self.close(Some(ConnectionError::Eof)).await;
                    break;
                }
                Err(e) => {
                    self.close(Some(ConnectionError::Io(e))).await;
                    break;
                }
            }
        }
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Route one decoded line. Returns true when the read loop must stop.
    async fn route(&self, registry: &MessageRegistry, line: &str) -> bool {
        let envelope = match registry.decode_line(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable line");
                return false;
            }
        };

        match &envelope.message {
            InboundMessage::Info(info) => {
                self.shared.settings.write().hydrate(info.settings_map());
                *self.shared.info.write() = Some(info.clone());
                self.forward(DeckEvent::Info(info.clone()));
            }
            InboundMessage::Settings(msg) => {
                self.shared.settings.write().hydrate(msg.settings_map());
                self.forward(DeckEvent::Settings(msg.clone()));
            }
            InboundMessage::Broadcast(msg) => {
                self.forward(DeckEvent::Broadcast(msg.clone()));
            }
            InboundMessage::ListChange(msg) => {
                self.forward(DeckEvent::ListChanged(msg.clone()));
            }
            InboundMessage::NotificationOptionClicked(msg) => {
                self.forward(DeckEvent::NotificationOptionClicked(msg.clone()));
            }
            InboundMessage::ShortConnectorId(notification) => {
                tracing::debug!(
                    connector_id = %notification.connector_id,
                    short_id = %notification.short_id,
                    "Short connector id recorded"
                );
                self.shared
                    .short_ids
                    .insert(notification.connector_id.clone(), notification.short_id.clone());
            }
            InboundMessage::ClosePlugin => {
                tracing::info!("Close requested by host");
                self.close(None).await;
                return true;
            }
            InboundMessage::Action(_)
            | InboundMessage::HoldDown(_)
            | InboundMessage::HoldUp(_)
            | InboundMessage::ConnectorChange(_) => {
                self.route_entity(&envelope);
            }
            InboundMessage::Unrecognized { type_tag } => {
                tracing::debug!(type_tag = %type_tag, "Dropping unrecognized message type");
            }
        }
        false
    }

    /// Route an entity-addressed message: filter by plugin id, dispatch, and
    /// fall back to the generic event on no match.
    fn route_entity(&self, envelope: &Envelope) {
        // Exact, case-sensitive match; traffic for other plugins sharing the
        // socket is dropped silently.
        if envelope.message.plugin_id() != Some(&self.plugin_id) {
            return;
        }

        let result = match &envelope.message {
            InboundMessage::Action(msg) => self.dispatcher.dispatch_action(envelope, msg, None),
            InboundMessage::HoldDown(msg) => {
                self.dispatcher
                    .dispatch_action(envelope, msg, Some(HeldState::HeldDown))
            }
            InboundMessage::HoldUp(msg) => {
                self.dispatcher
                    .dispatch_action(envelope, msg, Some(HeldState::HeldUp))
            }
            InboundMessage::ConnectorChange(msg) => {
                self.dispatcher.dispatch_connector(envelope, msg)
            }
            _ => return,
        };

        match result {
            Ok(DispatchOutcome::Invoked) => {}
            Ok(DispatchOutcome::NoMatch) => {
                self.forward(DeckEvent::Unhandled {
                    envelope: envelope.raw.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    type_tag = envelope.message.type_tag(),
                    error = %e,
                    "Parameter resolution failed, handler not invoked"
                );
            }
        }
    }

    /// Forward an event to the embedding application. The read loop must
    /// never stall on a slow consumer, so a full queue drops the event.
    fn forward(&self, event: DeckEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events.try_send(event) {
            tracing::warn!(event = event.label(), "Event queue full, dropping event");
        }
    }

    /// Serialize and write one outbound message. Returns true only after a
    /// real write; callers may retry on false.
    pub async fn send(&self, message: &OutboundMessage) -> bool {
        let line = match codec::encode_line(message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound message");
                return false;
            }
        };
        match self.write_line(&line).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Write failed");
                false
            }
        }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "session closed")
        })?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Tear the session down. Idempotent and safe to call concurrently with
    /// the read loop and with senders. Fires the disconnect event exactly
    /// once; `reason` is `None` when the host asked the plugin to close.
    pub async fn close(&self, reason: Option<ConnectionError>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match &reason {
            Some(err) => {
                tracing::info!(reason = %err, kind = err.error_kind(), "Closing session")
            }
            None => tracing::info!("Closing session"),
        }

        self.cancel.cancel();
        self.dispatcher.pool().shutdown();
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let _ = self.events.send(DeckEvent::Disconnected { reason }).await;
    }

    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.is_connected() && self.listening.load(Ordering::SeqCst)
    }

    pub fn plugin_id(&self) -> &PluginId {
        &self.plugin_id
    }

    pub(crate) fn shared(&self) -> &SessionShared {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deckline_core::{
        Handler, HandlerDescriptor, HandlerError, Invocation,
    };
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    struct RecordingHandler {
        descriptor: HandlerDescriptor,
        seen: Arc<Mutex<Vec<Invocation>>>,
    }

    #[async_trait]
    impl Handler for RecordingHandler {
        fn descriptor(&self) -> &HandlerDescriptor {
            &self.descriptor
        }

        async fn invoke(
            &self,
            invocation: Invocation,
            _ctx: &InvocationContext,
        ) -> Result<(), HandlerError> {
            self.seen.lock().push(invocation);
            Ok(())
        }
    }

    struct Fixture {
        session: Arc<Session>,
        events: mpsc::Receiver<DeckEvent>,
        host: TcpStream,
        seen: Arc<Mutex<Vec<Invocation>>>,
    }

    /// Spin up a fake host socket and a connected, paired, listening session.
    async fn fixture(descriptor: HandlerDescriptor) -> Fixture {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(RecordingHandler {
            descriptor,
            seen: Arc::clone(&seen),
        }));

        let mut config = ClientConfig::new("com.example.demo");
        config.port = port;

        let (events_tx, events) = mpsc::channel(32);
        let session = Session::connect(&config, Arc::new(registry), events_tx)
            .await
            .unwrap();
        let (host, _) = listener.accept().await.unwrap();

        session.pair().await.unwrap();
        session.listen();

        Fixture {
            session,
            events,
            host,
            seen,
        }
    }

    async fn read_line(host: &mut TcpStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = host.read(&mut byte).await.unwrap();
            if n == 0 || byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).unwrap()
    }

    async fn host_send(host: &mut TcpStream, line: &str) {
        host.write_all(line.as_bytes()).await.unwrap();
        host.write_all(b"\n").await.unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn pair_is_the_first_line_on_the_wire() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        let first = read_line(&mut fx.host).await;
        let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed["type"], "pair");
        assert_eq!(parsed["id"], "com.example.demo");
    }

    #[tokio::test]
    async fn matching_action_reaches_the_handler() {
        let mut fx = fixture(
            HandlerDescriptor::action("com.example.demo.action.play")
                .data("track", deckline_core::ValueKind::Int32),
        )
        .await;
        read_line(&mut fx.host).await; // pair

        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.example.demo","actionId":"com.example.demo.action.play","data":[{"id":"track","value":"3"}]}"#,
        )
        .await;
        settle().await;

        let seen = fx.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].value(0),
            Some(&deckline_core::TypedValue::Int32(3))
        );
    }

    #[tokio::test]
    async fn foreign_plugin_id_is_dropped_silently() {
        let mut fx = fixture(HandlerDescriptor::action("com.example.demo.action.play")).await;
        read_line(&mut fx.host).await;

        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.other.plugin","actionId":"com.example.demo.action.play","data":[]}"#,
        )
        .await;
        settle().await;

        assert!(fx.seen.lock().is_empty());
        assert!(fx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn plugin_id_match_is_case_sensitive() {
        let mut fx = fixture(HandlerDescriptor::action("com.example.demo.action.play")).await;
        read_line(&mut fx.host).await;

        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.example.DEMO","actionId":"com.example.demo.action.play","data":[]}"#,
        )
        .await;
        settle().await;
        assert!(fx.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn unmatched_entity_message_forwards_raw_envelope() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.example.demo","actionId":"nobody.home","data":[]}"#,
        )
        .await;
        settle().await;

        match fx.events.try_recv().unwrap() {
            DeckEvent::Unhandled { envelope } => {
                assert_eq!(envelope["actionId"], "nobody.home");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolution_failure_keeps_the_loop_alive() {
        let mut fx = fixture(
            HandlerDescriptor::action("com.example.demo.action.play")
                .data("track", deckline_core::ValueKind::Int32),
        )
        .await;
        read_line(&mut fx.host).await;

        // Missing the required data pair: handler must not run...
        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.example.demo","actionId":"com.example.demo.action.play","data":[]}"#,
        )
        .await;
        settle().await;
        assert!(fx.seen.lock().is_empty());

        // ...and the next message still dispatches normally.
        host_send(
            &mut fx.host,
            r#"{"type":"action","pluginId":"com.example.demo","actionId":"com.example.demo.action.play","data":[{"id":"track","value":"5"}]}"#,
        )
        .await;
        settle().await;
        assert_eq!(fx.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn info_hydrates_settings_and_forwards() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        host_send(
            &mut fx.host,
            r#"{"type":"info","sdkVersion":6,"settings":[{"Host":"localhost"}]}"#,
        )
        .await;
        settle().await;

        assert_eq!(
            fx.session.shared().settings.read().get("Host"),
            Some("localhost")
        );
        assert!(fx.session.shared().info.read().is_some());
        assert!(matches!(
            fx.events.try_recv().unwrap(),
            DeckEvent::Info(_)
        ));
    }

    #[tokio::test]
    async fn short_id_notification_updates_map_without_forwarding() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        host_send(
            &mut fx.host,
            r#"{"type":"shortConnectorIdNotification","pluginId":"com.example.demo","connectorId":"com.example.demo|c|10","shortId":"s7"}"#,
        )
        .await;
        settle().await;

        assert_eq!(
            fx.session.shared().short_ids.resolve("com.example.demo|c|10"),
            Some(deckline_core::ShortId::from_raw("s7"))
        );
        assert!(fx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_type_tag_is_dropped_silently() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        host_send(&mut fx.host, r#"{"type":"fancyNewThing","x":1}"#).await;
        host_send(&mut fx.host, "this is not json").await;
        settle().await;

        assert!(fx.events.try_recv().is_err());
        assert!(fx.session.is_listening());
    }

    #[tokio::test]
    async fn close_plugin_fires_disconnect_with_no_reason() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        host_send(&mut fx.host, r#"{"type":"closePlugin","pluginId":"com.example.demo"}"#).await;
        settle().await;

        match fx.events.recv().await.unwrap() {
            DeckEvent::Disconnected { reason } => assert!(reason.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!fx.session.is_connected());
    }

    #[tokio::test]
    async fn host_eof_fires_disconnect_with_reason() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        drop(fx.host);
        settle().await;

        match fx.events.recv().await.unwrap() {
            DeckEvent::Disconnected { reason } => {
                assert!(matches!(reason, Some(ConnectionError::Eof)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fires_once() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        fx.session.close(None).await;
        fx.session.close(None).await;
        settle().await;

        assert!(matches!(
            fx.events.recv().await.unwrap(),
            DeckEvent::Disconnected { .. }
        ));
        assert!(fx.events.try_recv().is_err());
        assert!(!fx.session.is_connected());
        assert!(!fx.session.is_listening());
    }

    #[tokio::test]
    async fn send_after_close_returns_false() {
        let mut fx = fixture(HandlerDescriptor::action("a")).await;
        read_line(&mut fx.host).await;

        fx.session.close(None).await;
        let sent = fx
            .session
            .send(&OutboundMessage::StateUpdate {
                id: deckline_core::EntityId::from_raw("s"),
                value: "v".into(),
            })
            .await;
        assert!(!sent);
    }
}
