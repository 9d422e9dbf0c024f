use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use rpclink_core::error::{Result, RpcLinkError};
use rpclink_core::protocol::{Outcome, QueryResult};

/// Teardown run once when a query leaves the table, before its caller wakes.
pub type SettleHook = Box<dyn FnOnce() + Send + Sync>;

/// One call awaiting its response.
struct PendingQuery {
    entrypoint: String,
    param: Value,
    timestamp: Instant,
    session: u64,
    responder: oneshot::Sender<Result<QueryResult>>,
    on_settled: Option<SettleHook>,
}

impl PendingQuery {
    fn finish(mut self, outcome: Result<QueryResult>) {
        if let Some(hook) = self.on_settled.take() {
            hook();
        }
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.responder.send(outcome);
    }
}

/// What the router learns when a response matches a pending query.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub entrypoint: String,
    pub elapsed: Duration,
    pub success: bool,
}

/// Receiving end of one registered query.
#[derive(Debug)]
pub struct Settlement {
    id: String,
    rx: oneshot::Receiver<Result<QueryResult>>,
}

impl Settlement {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the response (or for the query to be failed locally).
    pub async fn wait(self) -> Result<QueryResult> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // Tracker dropped with the query still pending.
            Err(_) => Err(RpcLinkError::ConnectionClosed),
        }
    }

    /// Non-blocking poll: `None` while the query is still pending.
    pub fn try_wait(&mut self) -> Option<Result<QueryResult>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RpcLinkError::ConnectionClosed)),
        }
    }
}

/// Correlation table: `id -> PendingQuery`.
///
/// - Sole owner of id generation (per instance, never reused)
/// - Exactly one of settle/reject/fail_session wins for a given id
/// - Queries carry their session so closing an old session leaves newer
///   queries alone
pub struct RequestTracker {
    pending: DashMap<String, PendingQuery>,
    counter: AtomicU64,
    /// Highest session number known to be closed.
    closed_through: AtomicU64,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            counter: AtomicU64::new(0),
            closed_through: AtomicU64::new(0),
        }
    }

    /// Next correlation id: base64 of the decimal counter (`0 -> "MA=="`).
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        STANDARD.encode(n.to_string())
    }

    /// Register a query under a fresh id.
    pub fn register(
        &self,
        entrypoint: &str,
        param: Value,
        session: u64,
        on_settled: Option<SettleHook>,
    ) -> Result<(String, Settlement)> {
        let id = self.next_id();
        let settlement = self.register_id(id.clone(), entrypoint, param, session, on_settled)?;
        Ok((id, settlement))
    }

    /// Register a query under an id reserved with [`next_id`](Self::next_id).
    pub fn register_id(
        &self,
        id: String,
        entrypoint: &str,
        param: Value,
        session: u64,
        on_settled: Option<SettleHook>,
    ) -> Result<Settlement> {
        let (tx, rx) = oneshot::channel();
        let query = PendingQuery {
            entrypoint: entrypoint.to_string(),
            param,
            timestamp: Instant::now(),
            session,
            responder: tx,
            on_settled,
        };

        // The entry guard holds the shard lock; hooks run only once it is gone.
        let rejected = match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => Some(query),
            Entry::Vacant(v) => {
                v.insert(query);
                None
            }
        };
        if let Some(query) = rejected {
            if let Some(hook) = query.on_settled {
                hook();
            }
            return Err(RpcLinkError::Transport(format!("duplicate request id {id}")));
        }

        // A session that closed while we were registering never fails us in
        // `fail_session`, so check after inserting.
        if session <= self.closed_through.load(Ordering::SeqCst) {
            if let Some((_, query)) = self.pending.remove(&id) {
                if let Some(hook) = query.on_settled {
                    hook();
                }
            }
            return Err(RpcLinkError::NotConnected);
        }

        Ok(Settlement { id, rx })
    }

    /// Resolve `id` with the server's answer. `None` if `id` is not pending.
    pub fn settle(&self, id: &str, outcome: Outcome) -> Option<Settled> {
        let (_, query) = self.pending.remove(id)?;
        let success = matches!(outcome, Outcome::Success { .. });
        let settled = Settled {
            entrypoint: query.entrypoint.clone(),
            elapsed: query.timestamp.elapsed(),
            success,
        };
        let result = QueryResult::from_outcome(query.entrypoint.clone(), query.param.clone(), outcome);
        query.finish(Ok(result));
        Some(settled)
    }

    /// Fail `id` locally (send failure). Returns `false` if not pending.
    pub fn reject(&self, id: &str, error: RpcLinkError) -> bool {
        match self.pending.remove(id) {
            Some((_, query)) => {
                query.finish(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every query of `session` (and older) with `ConnectionClosed`.
    pub fn fail_session(&self, session: u64) -> usize {
        self.closed_through.fetch_max(session, Ordering::SeqCst);

        let ids: Vec<String> = self
            .pending
            .iter()
            .filter(|e| e.value().session <= session)
            .map(|e| e.key().clone())
            .collect();

        let mut failed = 0;
        for id in ids {
            if let Some((_, query)) = self.pending.remove(&id) {
                query.finish(Err(RpcLinkError::ConnectionClosed));
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::info!(session, failed, "pending queries failed on connection loss");
        }
        failed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
