use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use rpclink_core::error::Result;
use rpclink_core::event::{Event, Listener};
use rpclink_core::protocol::envelope::Request;
use rpclink_core::protocol::{QueryResult, Update};

use crate::config::{ClientConfig, ClientSection};
use crate::dispatch::Router;
use crate::obs::metrics::ClientMetrics;
use crate::obs::trace::TraceFilter;
use crate::rpc::long_task::{CancelHandle, LongTask};
use crate::rpc::tracker::{RequestTracker, SettleHook, Settlement};
use crate::rpc::types::{Progress, Reply};
use crate::transport::{codec, ConnectSettings, Connection, SessionLink};

struct Inner {
    connection: Connection,
    tracker: Arc<RequestTracker>,
    updates: Arc<Event<Update>>,
    metrics: Arc<ClientMetrics>,
    trace: TraceFilter,
}

/// Client of the remote service over one WebSocket.
///
/// Cheap to clone; all clones share the connection, the id counter and the
/// pending queries.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.address())
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_queries())
            .finish()
    }
}

impl RpcClient {
    /// Build a client for `section`. Nothing is opened until [`connect`](Self::connect).
    pub fn new(section: ClientSection) -> Self {
        let tracker = Arc::new(RequestTracker::new());
        let updates = Arc::new(Event::new());
        let metrics = Arc::new(ClientMetrics::default());
        let trace = section.trace.clone();

        let router = Arc::new(Router::new(
            Arc::clone(&tracker),
            Arc::clone(&updates),
            Arc::clone(&metrics),
            trace.clone(),
        ));
        let connection = Connection::new(
            ConnectSettings::from(&section),
            router,
            Arc::clone(&metrics),
        );

        Self {
            inner: Arc::new(Inner {
                connection,
                tracker,
                updates,
                metrics,
                trace,
            }),
        }
    }

    /// Validate `config` and build a client from its `client` section.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.client.clone()))
    }

    pub fn address(&self) -> &str {
        self.inner.connection.address()
    }

    /// Open the connection; see [`Connection::connect`].
    pub async fn connect(&self) -> Result<()> {
        self.inner.connection.connect().await
    }

    /// Close the connection. Pending calls fail with `ConnectionClosed`.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_connected()
    }

    /// `true` when a session opens, `false` when it closes.
    pub fn event_connection_status(&self) -> &Event<bool> {
        self.inner.connection.event_status()
    }

    /// Every spontaneous update, whatever its name.
    pub fn event_update(&self) -> &Event<Update> {
        &self.inner.updates
    }

    /// Listen to the spontaneous updates called `name`.
    ///
    /// Returns the handle to pass to `event_update().remove(..)`.
    pub fn on_update<F>(&self, name: impl Into<String>, f: F) -> Listener<Update>
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let name = name.into();
        self.inner.updates.listen(move |update: &Update| {
            if update.name == name {
                f(&update.value);
            }
        })
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    /// Prometheus text for every client metric plus the pending query gauge.
    pub fn render_metrics(&self) -> String {
        let pending = self.pending_queries() as u64;
        self.inner
            .metrics
            .render(&[("rpclink_pending_queries", pending)])
    }

    /// Number of calls still waiting for a response.
    pub fn pending_queries(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Call `entrypoint` and return its result. RPC failures become
    /// `RpcLinkError::Rpc`.
    pub async fn exec(
        &self,
        entrypoint: &str,
        params: Option<Value>,
        chunk: Option<Bytes>,
    ) -> Result<Value> {
        Ok(self.exec_with_data(entrypoint, params, chunk).await?.result)
    }

    /// Like [`exec`](Self::exec), keeping the binary tail of the answer.
    pub async fn exec_with_data(
        &self,
        entrypoint: &str,
        params: Option<Value>,
        chunk: Option<Bytes>,
    ) -> Result<Reply> {
        let success = match self.try_to_exec(entrypoint, params, chunk).await?.into_result() {
            Ok(success) => success,
            Err(e) => {
                tracing::warn!(
                    entrypoint,
                    address = %self.address(),
                    code = ?e.rpc_code(),
                    error = %e,
                    "call failed"
                );
                return Err(e);
            }
        };
        Ok(Reply {
            result: success.result,
            data: success.data,
        })
    }

    /// Call `entrypoint`; RPC failures come back as `QueryResult::Failure`.
    ///
    /// Only local problems (not connected, send failure, connection lost)
    /// are errors.
    pub async fn try_to_exec(
        &self,
        entrypoint: &str,
        params: Option<Value>,
        chunk: Option<Bytes>,
    ) -> Result<QueryResult> {
        let link = self.inner.connection.link()?;
        let settlement = self.start_query(&link, None, entrypoint, params, chunk, None)?;
        settlement.wait().await
    }

    /// Start a cancellable call reporting progress.
    ///
    /// `on_progress` receives every progress update of this call, in order.
    pub fn exec_long_task(
        &self,
        entrypoint: &str,
        params: Option<Value>,
        on_progress: Option<Listener<Progress>>,
        chunk: Option<Bytes>,
    ) -> Result<LongTask> {
        let inner = &self.inner;
        let link = inner.connection.link()?;
        let id = inner.tracker.next_id();

        let progress: Arc<Event<Progress>> = Arc::new(Event::new());
        if let Some(listener) = on_progress {
            progress.add(listener);
        }

        let forward = {
            let id = id.clone();
            let progress = Arc::clone(&progress);
            inner.updates.listen(move |update: &Update| {
                if let Some(p) = Progress::from_update(&id, update) {
                    progress.trigger(&p);
                }
            })
        };
        let teardown: SettleHook = {
            let updates = Arc::clone(&inner.updates);
            Box::new(move || {
                updates.remove(&forward);
            })
        };

        let settlement = self.start_query(
            &link,
            Some(id.clone()),
            entrypoint,
            params,
            chunk,
            Some(teardown),
        )?;
        let cancel = CancelHandle::new(
            id.clone(),
            link,
            Arc::clone(&progress),
            Arc::clone(&inner.tracker),
            Arc::clone(&inner.metrics),
        );
        Ok(LongTask::new(id, progress, cancel, settlement))
    }

    /// Register, then send. A failed send rejects the query right away.
    fn start_query(
        &self,
        link: &SessionLink,
        id: Option<String>,
        entrypoint: &str,
        params: Option<Value>,
        chunk: Option<Bytes>,
        on_settled: Option<SettleHook>,
    ) -> Result<Settlement> {
        let inner = &self.inner;
        let param = params.clone().unwrap_or(Value::Null);
        let settlement = match id {
            Some(id) => inner
                .tracker
                .register_id(id, entrypoint, param, link.session(), on_settled)?,
            None => {
                inner
                    .tracker
                    .register(entrypoint, param, link.session(), on_settled)?
                    .1
            }
        };
        let id = settlement.id().to_string();

        let sent = Request::new(&id, entrypoint, params.as_ref())
            .to_json()
            .and_then(|text| codec::encode(&text, chunk.as_deref()))
            .and_then(|msg| link.send(msg));
        if let Err(e) = sent {
            tracing::warn!(%id, entrypoint, error = %e, "call not sent");
            inner.tracker.reject(&id, e.clone());
            return Err(e);
        }

        inner.metrics.calls.inc(&[("entrypoint", entrypoint)]);
        inner.trace.outgoing(&id, entrypoint, params.as_ref());
        Ok(settlement)
    }
}
