//! Cancellable, progress-reporting calls.
//!
//! A long task is one ordinary pending query plus a temporary listener on
//! spontaneous updates. Cancelling only asks the server to stop: the task
//! still settles through the normal response path, with whatever the server
//! decides to answer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_tungstenite::tungstenite::Message;

use rpclink_core::error::Result;
use rpclink_core::event::Event;
use rpclink_core::protocol::envelope::Notification;
use rpclink_core::protocol::QueryResult;

use crate::obs::metrics::ClientMetrics;
use crate::rpc::tracker::{RequestTracker, Settlement};
use crate::rpc::types::{Progress, Reply, CANCELLATION_LABEL};
use crate::transport::SessionLink;

/// Cloneable handle that cancels one long task.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

struct CancelState {
    id: String,
    requested: AtomicBool,
    link: SessionLink,
    progress: Arc<Event<Progress>>,
    tracker: Arc<RequestTracker>,
    metrics: Arc<ClientMetrics>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.inner.id)
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl CancelHandle {
    pub(crate) fn new(
        id: String,
        link: SessionLink,
        progress: Arc<Event<Progress>>,
        tracker: Arc<RequestTracker>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(CancelState {
                id,
                requested: AtomicBool::new(false),
                link,
                progress,
                tracker,
                metrics,
            }),
        }
    }

    /// Ask the server to abort the task.
    ///
    /// Sends one `cancel` notification and reports a synthetic
    /// "Cancellation..." progress. Returns `false` (and sends nothing) when a
    /// cancel was already requested or the task has already settled.
    pub fn cancel(&self) -> bool {
        let state = &self.inner;
        if !state.tracker.contains(&state.id) {
            return false;
        }
        if state.requested.swap(true, Ordering::AcqRel) {
            return false;
        }

        state
            .progress
            .trigger(&Progress::new(1.0, CANCELLATION_LABEL));

        let sent = Notification::cancel(&state.id)
            .to_json()
            .and_then(|text| state.link.send(Message::Text(text)));
        match sent {
            Ok(()) => {
                state.metrics.cancels.inc(&[]);
                tracing::debug!(id = %state.id, "cancel requested");
            }
            // The session is gone; the pending query fails on its own.
            Err(e) => tracing::warn!(id = %state.id, error = %e, "cancel not sent"),
        }
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }
}

/// Handle on a running long task.
#[derive(Debug)]
pub struct LongTask {
    id: String,
    progress: Arc<Event<Progress>>,
    cancel: CancelHandle,
    settlement: Settlement,
}

impl LongTask {
    pub(crate) fn new(
        id: String,
        progress: Arc<Event<Progress>>,
        cancel: CancelHandle,
        settlement: Settlement,
    ) -> Self {
        Self {
            id,
            progress,
            cancel,
            settlement,
        }
    }

    /// Correlation id of the underlying call.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Progress reports of this task, in arrival order.
    pub fn progress(&self) -> &Arc<Event<Progress>> {
        &self.progress
    }

    /// See [`CancelHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Handle usable after `wait` has consumed the task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_requested()
    }

    /// Wait for the result. RPC failures become `RpcLinkError::Rpc`.
    pub async fn wait(self) -> Result<serde_json::Value> {
        Ok(self.wait_with_data().await?.result)
    }

    /// Like [`wait`](Self::wait), keeping the binary tail.
    pub async fn wait_with_data(self) -> Result<Reply> {
        let success = self.settlement.wait().await?.into_result()?;
        Ok(Reply {
            result: success.result,
            data: success.data,
        })
    }

    /// Wait for the tagged result instead of failing on RPC errors.
    pub async fn try_wait(self) -> Result<QueryResult> {
        self.settlement.wait().await
    }
}
