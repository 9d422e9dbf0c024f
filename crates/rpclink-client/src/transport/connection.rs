//! WebSocket connection manager.
//!
//! Responsibilities:
//! - Bounded-retry connect loop (fixed delay, per-attempt timeout)
//! - One writer task owning the sink; every send funnels through its queue
//! - One reader task forwarding inbound messages, in arrival order, to the
//!   [`InboundHandler`]
//! - Connection status signal (`true` on open, `false` on close)
//!
//! There is no automatic reconnect: when the socket closes, the session's
//! pending queries are failed and callers decide whether to `connect()` again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rpclink_core::error::{Result, RpcLinkError};
use rpclink_core::event::Event;

use crate::config::ClientSection;
use crate::obs::metrics::ClientMetrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receives everything the reader task takes off the socket.
pub trait InboundHandler: Send + Sync {
    /// One inbound message of session `session`. Must not panic or block.
    fn handle_message(&self, session: u64, msg: Message);

    /// Session `session` is gone (closed by either side).
    fn session_closed(&self, session: u64);
}

#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub address: String,
    pub attempts: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
}

impl From<&ClientSection> for ConnectSettings {
    fn from(c: &ClientSection) -> Self {
        Self {
            address: c.address.clone(),
            attempts: c.connect_attempts.max(1),
            retry_delay: c.retry_delay(),
            connect_timeout: c.connect_timeout(),
        }
    }
}

/// Sending half of one open session.
///
/// Cloneable; every clone writes to the same socket. Once the session ends,
/// sends fail with `NotConnected`.
#[derive(Debug, Clone)]
pub struct SessionLink {
    session: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

impl SessionLink {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }

    pub fn send(&self, msg: Message) -> Result<()> {
        self.outbound
            .send(msg)
            .map_err(|_| RpcLinkError::NotConnected)
    }
}

struct Slot {
    link: SessionLink,
    reader: Option<JoinHandle<()>>,
}

struct Shared {
    settings: ConnectSettings,
    status: Event<bool>,
    current: Mutex<Option<Slot>>,
    sessions: AtomicU64,
    handler: Arc<dyn InboundHandler>,
    metrics: Arc<ClientMetrics>,
}

impl Shared {
    /// Take the current slot, optionally only if it belongs to `session`.
    fn take_slot(&self, only: Option<u64>) -> Option<Slot> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let matches = match (current.as_ref(), only) {
            (Some(slot), Some(session)) => slot.link.session == session,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            current.take()
        } else {
            None
        }
    }

    /// Tear a session down: close the socket, fail its queries, emit `false`.
    fn retire(&self, slot: Slot, abort_reader: bool) {
        let session = slot.link.session;
        // The writer sends the close frame and then drops its queue.
        let _ = slot.link.send(Message::Close(None));
        if abort_reader {
            if let Some(reader) = slot.reader {
                reader.abort();
            }
        }

        tracing::info!(address = %self.settings.address, session, "connection closed");
        self.metrics.sessions_open.dec(&[]);
        self.handler.session_closed(session);
        self.status.trigger(&false);
    }
}

/// Owner of the single socket.
pub struct Connection {
    shared: Arc<Shared>,
    /// Serializes connect/disconnect; keeps the outcome of the last connect.
    connecting: tokio::sync::Mutex<Option<Result<()>>>,
    connect_epoch: AtomicU64,
}

impl Connection {
    pub fn new(
        settings: ConnectSettings,
        handler: Arc<dyn InboundHandler>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                settings,
                status: Event::new(),
                current: Mutex::new(None),
                sessions: AtomicU64::new(0),
                handler,
                metrics,
            }),
            connecting: tokio::sync::Mutex::new(None),
            connect_epoch: AtomicU64::new(0),
        }
    }

    pub fn address(&self) -> &str {
        &self.shared.settings.address
    }

    /// Fires `true` when a session opens and `false` when it closes.
    pub fn event_status(&self) -> &Event<bool> {
        &self.shared.status
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|slot| slot.link.is_open())
    }

    /// Sending half of the open session.
    pub fn link(&self) -> Result<SessionLink> {
        self.shared
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|slot| slot.link.clone())
            .ok_or(RpcLinkError::NotConnected)
    }

    pub fn send(&self, msg: Message) -> Result<()> {
        self.link()?.send(msg)
    }

    /// Open a fresh session, closing the previous one first.
    ///
    /// Callers that arrive while another connect is running wait for it and
    /// share its outcome instead of starting a second one.
    pub async fn connect(&self) -> Result<()> {
        let observed = self.connect_epoch.load(Ordering::Acquire);
        let mut last = self.connecting.lock().await;
        if self.connect_epoch.load(Ordering::Acquire) != observed {
            if let Some(outcome) = last.as_ref() {
                return outcome.clone();
            }
        }

        if let Some(slot) = self.shared.take_slot(None) {
            self.shared.retire(slot, true);
        }

        let outcome = self.open_with_retries().await;
        *last = Some(outcome.clone());
        self.connect_epoch.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Close the open session, if any. Pending queries of that session fail.
    pub async fn disconnect(&self) {
        let _guard = self.connecting.lock().await;
        if let Some(slot) = self.shared.take_slot(None) {
            self.shared.retire(slot, true);
        }
    }

    async fn open_with_retries(&self) -> Result<()> {
        let settings = &self.shared.settings;
        let address = settings.address.as_str();
        tracing::info!(%address, "attempting to connect");

        let mut reason = String::new();
        for attempt in 1..=settings.attempts {
            match open_socket(settings).await {
                Ok(ws) => {
                    self.shared.metrics.connect_attempts.inc(&[("result", "ok")]);
                    start_session(&self.shared, ws);
                    return Ok(());
                }
                Err(e) => {
                    self.shared.metrics.connect_attempts.inc(&[("result", "error")]);
                    tracing::warn!(%address, attempt, max = settings.attempts, error = %e, "connection attempt failed");
                    reason = e;
                }
            }
            if attempt < settings.attempts {
                tokio::time::sleep(settings.retry_delay).await;
            }
        }

        Err(RpcLinkError::ConnectFailed {
            address: settings.address.clone(),
            attempts: settings.attempts,
            reason,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(slot) = self.shared.take_slot(None) {
            self.shared.retire(slot, true);
        }
    }
}

async fn open_socket(settings: &ConnectSettings) -> std::result::Result<WsStream, String> {
    match tokio::time::timeout(
        settings.connect_timeout,
        connect_async(settings.address.as_str()),
    )
    .await
    {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "timed out after {} ms",
            settings.connect_timeout.as_millis()
        )),
    }
}

fn start_session(shared: &Arc<Shared>, ws: WsStream) {
    let session = shared.sessions.fetch_add(1, Ordering::AcqRel) + 1;
    let (sink, stream) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(run_writer(session, sink, rx));
    {
        let mut current = shared.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Slot {
            link: SessionLink {
                session,
                outbound: tx,
            },
            reader: None,
        });
    }

    tracing::info!(address = %shared.settings.address, session, "connected");
    shared.metrics.sessions_open.inc(&[]);
    shared.status.trigger(&true);

    let reader = tokio::spawn(run_reader(Arc::clone(shared), session, stream));
    let mut current = shared.current.lock().unwrap_or_else(PoisonError::into_inner);
    match current.as_mut() {
        Some(slot) if slot.link.session == session => slot.reader = Some(reader),
        // Already retired by a status listener; the reader must not outlive it.
        _ => reader.abort(),
    }
}

async fn run_writer(
    session: u64,
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::warn!(session, error = %e, "websocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn run_reader(shared: Arc<Shared>, session: u64, mut stream: SplitStream<WsStream>) {
    while let Some(incoming) = stream.next().await {
        match incoming {
            Ok(Message::Close(_)) => break,
            Ok(msg) => shared.handler.handle_message(session, msg),
            Err(e) => {
                tracing::warn!(session, error = %e, "websocket read failed");
                break;
            }
        }
    }

    if let Some(slot) = shared.take_slot(Some(session)) {
        shared.retire(slot, false);
    }
}
