use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use shared::config::{Config, ReconnectPolicy};
use shared::models::{ClientEvent, ServerEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;

/// Observable state of the socket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket open.
    Disconnected,
    /// Handshake or reconnect in progress.
    Connecting,
    /// Socket open and ready.
    Connected,
    /// The transport gave up reconnecting.
    Error,
}

/// Transport settings for the socket connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Socket endpoint (`ws://` or `wss://`).
    pub url: Url,
    /// Bounded wait for the handshake.
    pub connect_timeout: Duration,
    /// Bounded reconnection policy.
    pub reconnect: ReconnectPolicy,
}

impl From<&Config> for ConnectionConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.socket_url.clone(),
            connect_timeout: config.connect_timeout(),
            reconnect: config.reconnect.clone(),
        }
    }
}

type SubscriberSlot = Arc<Mutex<Option<(u64, mpsc::UnboundedSender<ServerEvent>)>>>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns the lifecycle of the single socket connection per authenticated
/// session: opens it when a credential is available, tears it down on
/// logout, and hands out [`Connection`] handles.
#[derive(Debug)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    credential: Option<String>,
    connection: Option<Connection>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            credential: None,
            connection: None,
        }
    }

    /// Brings the connection in line with the credential: opens a socket when
    /// one is available and none is open, no-ops when already connected with
    /// the same credential, and tears down on an empty credential (logout).
    pub fn ensure_connected(&mut self, credential: Option<&str>) {
        let Some(credential) = credential.filter(|c| !c.is_empty()) else {
            self.disconnect();
            return;
        };

        let alive = self
            .connection
            .as_ref()
            .is_some_and(|conn| !conn.task.is_finished());
        if alive && self.credential.as_deref() == Some(credential) {
            return;
        }

        self.disconnect();
        self.credential = Some(credential.to_string());
        self.connection = Some(Connection::open(&self.config, credential));
    }

    /// The current connection handle, if any.
    ///
    /// Handles are not stable across reconnect cycles of the manager; re-read
    /// rather than caching one long-term.
    #[must_use]
    pub fn connection(&self) -> Option<Connection> {
        self.connection.clone()
    }

    /// Tears down the socket and forgets the credential.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.task.abort();
            if let Ok(mut slot) = conn.slot.lock() {
                *slot = None;
            }
            info!("socket connection torn down");
        }
        self.credential = None;
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Cloneable handle to the live socket: outbound sends and live-event
/// subscription.
#[derive(Debug, Clone)]
pub struct Connection {
    outbound: mpsc::UnboundedSender<ClientEvent>,
    status: watch::Receiver<ConnectionStatus>,
    slot: SubscriberSlot,
    next_subscriber: Arc<AtomicU64>,
    task: Arc<JoinHandle<()>>,
}

impl Connection {
    fn open(config: &ConnectionConfig, credential: &str) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let slot: SubscriberSlot = Arc::new(Mutex::new(None));

        let task = tokio::spawn(transport_task(
            config.clone(),
            credential.to_string(),
            outbound_rx,
            status_tx,
            Arc::clone(&slot),
        ));

        Self {
            outbound: outbound_tx,
            status: status_rx,
            slot,
            next_subscriber: Arc::new(AtomicU64::new(0)),
            task: Arc::new(task),
        }
    }

    /// Current transport status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Emits one event over the socket.
    ///
    /// # Errors
    /// `ConnectionUnavailable` when the socket is not currently connected;
    /// the caller surfaces a transient error and the user may resend.
    pub fn send(&self, event: &ClientEvent) -> Result<(), ClientError> {
        if self.status() != ConnectionStatus::Connected {
            return Err(ClientError::ConnectionUnavailable);
        }
        self.outbound
            .send(event.clone())
            .map_err(|_| ClientError::ConnectionUnavailable)
    }

    /// Registers the live-event subscriber, replacing any previous one: at
    /// most one handler receives events at any time. The returned guard
    /// unregisters itself on drop.
    #[must_use]
    pub fn subscribe(&self) -> LiveEvents {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.slot.lock() {
            if slot.is_some() {
                debug!("replacing previous live-event subscriber");
            }
            *slot = Some((id, tx));
        }
        LiveEvents {
            id,
            rx,
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Scoped live-event subscription. Receives every [`ServerEvent`] pushed on
/// the connection until dropped or replaced by a newer subscriber.
#[derive(Debug)]
pub struct LiveEvents {
    id: u64,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    slot: SubscriberSlot,
}

impl LiveEvents {
    /// Next pushed event; `None` once this subscription has been replaced or
    /// the connection torn down.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }
}

impl Drop for LiveEvents {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            if slot.as_ref().is_some_and(|(id, _)| *id == self.id) {
                *slot = None;
            }
        }
    }
}

enum PumpExit {
    OutboundClosed,
    ConnectionLost,
}

async fn transport_task(
    config: ConnectionConfig,
    credential: String,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    slot: SubscriberSlot,
) {
    let mut attempt: u32 = 0;
    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);
        let request = match build_request(&config.url, &credential) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "invalid socket request; giving up");
                let _ = status_tx.send(ConnectionStatus::Error);
                return;
            }
        };

        match timeout(config.connect_timeout, connect_async(request)).await {
            Ok(Ok((ws, _response))) => {
                attempt = 0;
                let _ = status_tx.send(ConnectionStatus::Connected);
                info!(url = %config.url, "socket connected");
                match run_socket(ws, &mut outbound_rx, &slot).await {
                    PumpExit::OutboundClosed => {
                        let _ = status_tx.send(ConnectionStatus::Disconnected);
                        return;
                    }
                    PumpExit::ConnectionLost => {
                        warn!("socket connection lost");
                    }
                }
            }
            Ok(Err(error)) => {
                warn!(%error, "socket connect failed");
            }
            Err(_) => {
                warn!(timeout = ?config.connect_timeout, "socket connect timed out");
            }
        }

        let _ = status_tx.send(ConnectionStatus::Disconnected);
        if attempt >= config.reconnect.max_attempts {
            warn!(attempts = attempt, "giving up on socket reconnection");
            let _ = status_tx.send(ConnectionStatus::Error);
            return;
        }
        tokio::time::sleep(config.reconnect.delay_for_attempt(attempt)).await;
        attempt += 1;
    }
}

async fn run_socket(
    ws: WsStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    slot: &SubscriberSlot,
) -> PumpExit {
    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            return PumpExit::ConnectionLost;
                        }
                    }
                    Err(error) => warn!(%error, "failed to encode outbound event"),
                },
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::OutboundClosed;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => deliver(slot, text.as_str()),
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        return PumpExit::ConnectionLost;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return PumpExit::ConnectionLost,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "socket receive error");
                    return PumpExit::ConnectionLost;
                }
            }
        }
    }
}

/// Parses one text frame and hands it to the registered subscriber.
/// Malformed frames are logged and dropped; they never kill the pump.
fn deliver(slot: &SubscriberSlot, text: &str) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => {
            let Ok(guard) = slot.lock() else { return };
            match guard.as_ref() {
                Some((_, tx)) => {
                    if tx.send(event).is_err() {
                        debug!("live subscriber gone; event discarded");
                    }
                }
                None => debug!("no live subscriber; event discarded"),
            }
        }
        Err(error) => warn!(%error, "dropping malformed server event"),
    }
}

fn build_request(
    url: &Url,
    credential: &str,
) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ClientError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    let value = HeaderValue::from_str(&format!("Bearer {credential}"))
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{QueryResponseEvent, RoomCreateRequest, RoomId};

    fn test_config(url: &str) -> ConnectionConfig {
        ConnectionConfig {
            url: Url::parse(url).unwrap(),
            connect_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy {
                max_attempts: 0,
                initial_delay_ms: 10,
                max_delay_ms: 10,
            },
        }
    }

    async fn wait_for_status(connection: &Connection, wanted: ConnectionStatus) {
        for _ in 0..200 {
            if connection.status() == wanted {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("connection never reached {wanted:?}");
    }

    #[test]
    fn test_deliver_drops_malformed_frames() {
        let slot: SubscriberSlot = Arc::new(Mutex::new(None));
        let (tx, mut rx) = mpsc::unbounded_channel();
        *slot.lock().unwrap() = Some((0, tx));

        deliver(&slot, "not json");
        deliver(&slot, r#"{"event":"bogus:event","payload":{}}"#);
        deliver(&slot, r#"{"event":"room:created","payload":{"roomId":"r1"}}"#);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, ServerEvent::RoomCreated(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropping_live_events_unregisters_the_handler() {
        let slot: SubscriberSlot = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::unbounded_channel();
        *slot.lock().unwrap() = Some((7, tx));
        let guard = LiveEvents {
            id: 7,
            rx,
            slot: Arc::clone(&slot),
        };
        drop(guard);
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_stale_guard_drop_does_not_clobber_replacement() {
        let slot: SubscriberSlot = Arc::new(Mutex::new(None));
        let (old_tx, old_rx) = mpsc::unbounded_channel();
        *slot.lock().unwrap() = Some((0, old_tx));
        let old_guard = LiveEvents {
            id: 0,
            rx: old_rx,
            slot: Arc::clone(&slot),
        };

        // A newer subscriber replaced the slot entry.
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        *slot.lock().unwrap() = Some((1, new_tx));

        drop(old_guard);
        assert!(slot.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_credential_opens_no_connection() {
        let mut manager = ConnectionManager::new(test_config("ws://127.0.0.1:1/"));
        manager.ensure_connected(None);
        assert!(manager.connection().is_none());
        manager.ensure_connected(Some(""));
        assert!(manager.connection().is_none());
    }

    #[tokio::test]
    async fn test_ensure_connected_is_idempotent_for_same_credential() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold both sockets open, should a second ever arrive.
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while ws.next().await.is_some() {}
                });
            }
        });

        let mut manager = ConnectionManager::new(test_config(&format!("ws://{addr}/")));
        manager.ensure_connected(Some("token"));
        let first = manager.connection().unwrap();
        wait_for_status(&first, ConnectionStatus::Connected).await;

        manager.ensure_connected(Some("token"));
        let second = manager.connection().unwrap();
        assert!(Arc::ptr_eq(&first.slot, &second.slot));

        // A changed credential replaces the connection.
        manager.ensure_connected(Some("other-token"));
        let third = manager.connection().unwrap();
        assert!(!Arc::ptr_eq(&first.slot, &third.slot));
    }

    #[tokio::test]
    async fn test_round_trip_over_loopback_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // First client frame must be the room:create event.
            let frame = ws.next().await.unwrap().unwrap();
            let Message::Text(text) = frame else {
                panic!("expected text frame");
            };
            let event: ClientEvent = serde_json::from_str(text.as_str()).unwrap();
            assert!(matches!(event, ClientEvent::RoomCreate(_)));

            // Push garbage (must be dropped), then a real reply.
            ws.send(Message::Text("{}".into())).await.unwrap();
            let reply = serde_json::json!({
                "event": "query:response",
                "payload": {"roomId": "r1", "message": "67k"}
            });
            ws.send(Message::Text(reply.to_string().into())).await.unwrap();

            // Keep the socket open until the client goes away.
            while ws.next().await.is_some() {}
        });

        let mut manager = ConnectionManager::new(test_config(&format!("ws://{addr}/")));
        manager.ensure_connected(Some("token"));
        let connection = manager.connection().unwrap();
        let mut live = connection.subscribe();
        wait_for_status(&connection, ConnectionStatus::Connected).await;

        connection
            .send(&ClientEvent::RoomCreate(RoomCreateRequest {
                message: "What's BTC price?".into(),
            }))
            .unwrap();

        let event = timeout(Duration::from_secs(5), live.recv())
            .await
            .expect("timed out waiting for live event")
            .expect("subscription closed");
        assert_eq!(
            event,
            ServerEvent::QueryResponse(QueryResponseEvent {
                room_id: RoomId::new("r1"),
                message: "67k".into(),
                ticker: None,
                table: None,
            })
        );

        manager.disconnect();
        assert!(manager.connection().is_none());
        server.abort();
    }

    #[tokio::test]
    async fn test_send_fails_while_disconnected() {
        // Nothing listens on this port; the transport keeps connecting.
        let mut manager = ConnectionManager::new(test_config("ws://127.0.0.1:9/"));
        manager.ensure_connected(Some("token"));
        let connection = manager.connection().unwrap();

        let result = connection.send(&ClientEvent::RoomCreate(RoomCreateRequest {
            message: "hello".into(),
        }));
        assert!(matches!(result, Err(ClientError::ConnectionUnavailable)));
    }
}
