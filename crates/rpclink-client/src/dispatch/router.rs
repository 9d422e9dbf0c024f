use std::sync::Arc;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use rpclink_core::error::Result;
use rpclink_core::event::Event;
use rpclink_core::protocol::{Envelope, Incoming, Update};

use crate::obs::metrics::ClientMetrics;
use crate::obs::trace::TraceFilter;
use crate::rpc::tracker::RequestTracker;
use crate::transport::codec::{self, Inbound};
use crate::transport::InboundHandler;

/// What happened to one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Settled the pending query with this id.
    Settled(String),
    /// No pending query with this id.
    UnknownId(String),
    /// Broadcast to update listeners.
    Update(String),
    /// Dropped as malformed.
    Malformed,
    /// Not an envelope (ping, pong, ...).
    Ignored,
}

/// Inbound side of the client: classifies envelopes and hands them to the
/// tracker or to the update listeners.
///
/// Never fails: malformed input and unknown ids are logged, counted and
/// dropped so one bad frame cannot end the session.
pub struct Router {
    tracker: Arc<RequestTracker>,
    updates: Arc<Event<Update>>,
    metrics: Arc<ClientMetrics>,
    trace: TraceFilter,
}

impl Router {
    pub fn new(
        tracker: Arc<RequestTracker>,
        updates: Arc<Event<Update>>,
        metrics: Arc<ClientMetrics>,
        trace: TraceFilter,
    ) -> Self {
        Self {
            tracker,
            updates,
            metrics,
            trace,
        }
    }

    /// Route one native socket message.
    pub fn route(&self, msg: Message) -> Routed {
        match codec::decode(msg) {
            Ok(Inbound::Envelope { text, chunk }) => self.route_envelope(&text, chunk),
            Ok(_) => Routed::Ignored,
            Err(e) => self.malformed("frame", e),
        }
    }

    /// Route decoded envelope text plus its optional binary tail.
    pub fn route_envelope(&self, text: &str, chunk: Option<Bytes>) -> Routed {
        match self.classify(text, chunk) {
            Ok(Incoming::Update(update)) => {
                self.metrics.updates.inc(&[("name", update.name.as_str())]);
                self.trace.update(&update.name, &update.value);
                self.updates.trigger(&update);
                Routed::Update(update.name)
            }
            Ok(Incoming::Response { id, outcome }) => match self.tracker.settle(&id, outcome) {
                Some(settled) => {
                    let result = if settled.success { "success" } else { "failure" };
                    self.metrics.responses.inc(&[("result", result)]);
                    self.metrics
                        .call_duration
                        .observe(&[("entrypoint", settled.entrypoint.as_str())], settled.elapsed);
                    self.trace
                        .incoming(&id, &settled.entrypoint, settled.elapsed, settled.success);
                    Routed::Settled(id)
                }
                None => {
                    self.metrics.unknown_ids.inc(&[]);
                    tracing::debug!(%id, "response for unknown id dropped");
                    Routed::UnknownId(id)
                }
            },
            Err(e) => self.malformed("envelope", e),
        }
    }

    fn classify(&self, text: &str, chunk: Option<Bytes>) -> Result<Incoming> {
        Envelope::from_json(text)?.classify(chunk)
    }

    fn malformed(&self, kind: &'static str, e: rpclink_core::RpcLinkError) -> Routed {
        self.metrics.decode_errors.inc(&[("kind", kind)]);
        tracing::warn!(kind, error = %e, "malformed inbound message dropped");
        Routed::Malformed
    }
}

impl InboundHandler for Router {
    fn handle_message(&self, _session: u64, msg: Message) {
        self.route(msg);
    }

    fn session_closed(&self, session: u64) {
        self.tracker.fail_session(session);
    }
}
