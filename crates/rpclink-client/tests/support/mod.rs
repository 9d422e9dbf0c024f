//! In-process fake service for integration tests.
//!
//! An axum WebSocket endpoint that speaks the hybrid frame protocol and
//! answers a fixed script of entrypoints:
//!
//! | method       | behaviour                                                   |
//! |--------------|-------------------------------------------------------------|
//! | get-version  | text reply `{major:3,minor:8,patch:0,revision:"abc"}`       |
//! | echo         | `{"params": <params>}` plus the request tail echoed back    |
//! | fail         | error `-32603 "boom"`                                       |
//! | bare-fail    | error object without code or message                        |
//! | snapshot     | `{"format":"png"}` plus a 4 byte tail                       |
//! | scalar-tail  | result `42` plus a tail (tail must be dropped)              |
//! | add-model    | progress 0.3, foreign progress, progress 0.8, then result   |
//! | delayed      | waits `params.ms`, answers `params.value`                   |
//! | slow-task    | answers only after a cancel, with error `-32000`            |
//! | quick-task   | answers `"done"` at once                                    |
//! | duplicate    | answers the same id twice                                   |
//! | push         | emits update `params.name` = `params.value`, answers null   |
//! | noise        | malformed frames and a null-id update, then `"survived"`    |
//! | hang-up      | closes the socket without answering                         |
//! | never        | never answers                                               |
//! | (other)      | error `-32601 "method not found"`                           |

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use rpclink_client::config::ClientSection;
use rpclink_client::RpcClient;
use rpclink_core::protocol::frame;

/// What the backend saw, in arrival order.
#[derive(Debug, Clone)]
pub struct Received {
    pub envelope: Value,
    pub chunk: Vec<u8>,
    /// `true` when the request came as a binary frame.
    pub binary: bool,
}

#[derive(Clone, Default)]
struct BackendState {
    received: Arc<Mutex<Vec<Received>>>,
    connections: Arc<AtomicUsize>,
}

pub struct FakeBackend {
    pub address: String,
    state: BackendState,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = BackendState::default();
        let app = Router::new()
            .route("/", get(upgrade))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            address: format!("ws://{addr}/"),
            state,
        }
    }

    /// Client settings pointed at this backend with short retry timings.
    pub fn section(&self) -> ClientSection {
        let mut section = ClientSection::for_address(self.address.clone());
        section.connect_attempts = 2;
        section.retry_delay_ms = 20;
        section.connect_timeout_ms = 2_000;
        section
    }

    /// A client already connected to this backend.
    pub async fn client(&self) -> RpcClient {
        let client = RpcClient::new(self.section());
        client.connect().await.unwrap();
        client
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().unwrap().clone()
    }

    /// Envelopes received with the given `method`.
    pub fn received_method(&self, method: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.envelope["method"] == method)
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Wait until `n` envelopes with `method` arrived (or give up after 2s).
    pub async fn wait_for(&self, method: &str, n: usize) -> Vec<Received> {
        for _ in 0..200 {
            let got = self.received_method(method);
            if got.len() >= n {
                return got;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.received_method(method)
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/")
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<BackendState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

type Out = mpsc::UnboundedSender<Message>;
type Cancels = Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>;

fn reply_frame(out: &Out, envelope: Value, tail: &[u8]) {
    let bytes = frame::encode(&envelope.to_string(), tail).unwrap();
    let _ = out.send(Message::Binary(bytes.to_vec()));
}

fn reply_text(out: &Out, envelope: Value) {
    let _ = out.send(Message::Text(envelope.to_string()));
}

fn progress(out: &Out, id: &str, amount: f64, operation: Option<&str>) {
    let mut params = json!({ "id": id, "amount": amount });
    if let Some(op) = operation {
        params["operation"] = json!(op);
    }
    reply_frame(out, json!({ "jsonrpc": "2.0", "method": "progress", "params": params }), &[]);
}

async fn serve_socket(socket: WebSocket, state: BackendState) {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let cancels: Cancels = Arc::new(Mutex::new(HashMap::new()));

    while let Some(Ok(msg)) = stream.next().await {
        let (text, chunk, binary) = match msg {
            Message::Binary(b) => match frame::decode(b.into()) {
                Ok(f) => (f.text, f.chunk.to_vec(), true),
                Err(_) => continue,
            },
            Message::Text(t) => (t, Vec::new(), false),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(envelope) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        state.received.lock().unwrap().push(Received {
            envelope: envelope.clone(),
            chunk: chunk.clone(),
            binary,
        });

        tokio::spawn(answer(tx.clone(), Arc::clone(&cancels), envelope, chunk));
    }
}

async fn answer(out: Out, cancels: Cancels, envelope: Value, chunk: Vec<u8>) {
    let method = envelope["method"].as_str().unwrap_or_default().to_string();
    let params = envelope.get("params").cloned().unwrap_or(Value::Null);
    let Some(id) = envelope["id"].as_str().map(str::to_owned) else {
        if method == "cancel" {
            let target = params["id"].as_str().unwrap_or_default();
            if let Some(tx) = cancels.lock().unwrap().remove(target) {
                let _ = tx.send(());
            }
        }
        return;
    };

    match method.as_str() {
        "get-version" => reply_text(
            &out,
            json!({ "id": id, "result": { "major": 3, "minor": 8, "patch": 0, "revision": "abc" } }),
        ),
        "echo" => reply_frame(&out, json!({ "id": id, "result": { "params": params } }), &chunk),
        "fail" => reply_frame(
            &out,
            json!({ "id": id, "error": { "code": -32603, "message": "boom", "data": ["line 1", "line 2"] } }),
            &[],
        ),
        "bare-fail" => reply_frame(&out, json!({ "id": id, "error": {} }), &[]),
        "snapshot" => reply_frame(
            &out,
            json!({ "id": id, "result": { "format": "png" } }),
            &[0x89, b'P', b'N', b'G'],
        ),
        "scalar-tail" => reply_frame(&out, json!({ "id": id, "result": 42 }), &[1, 2, 3]),
        "add-model" => {
            progress(&out, &id, 0.3, Some("Parsing"));
            progress(&out, "someone-else", 0.5, None);
            progress(&out, &id, 0.8, None);
            reply_frame(&out, json!({ "id": id, "result": [{ "id": 1, "path": params["path"] }] }), &[]);
        }
        "delayed" => {
            let ms = params["ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            reply_frame(&out, json!({ "id": id, "result": params["value"] }), &[]);
        }
        "slow-task" => {
            let (tx, rx) = oneshot::channel();
            cancels.lock().unwrap().insert(id.clone(), tx);
            progress(&out, &id, 0.1, Some("Working"));
            if rx.await.is_ok() {
                reply_frame(
                    &out,
                    json!({ "id": id, "error": { "code": -32000, "message": "cancelled" } }),
                    &[],
                );
            }
        }
        "quick-task" => reply_frame(&out, json!({ "id": id, "result": "done" }), &[]),
        "duplicate" => {
            reply_frame(&out, json!({ "id": id, "result": 1 }), &[]);
            reply_frame(&out, json!({ "id": id, "result": 2 }), &[]);
        }
        "push" => {
            reply_frame(
                &out,
                json!({ "jsonrpc": "2.0", "method": params["name"], "params": params["value"] }),
                &[],
            );
            reply_frame(&out, json!({ "id": id, "result": null }), &[]);
        }
        "noise" => {
            let _ = out.send(Message::Binary(vec![1, 2]));
            let _ = out.send(Message::Binary(vec![200, 0, 0, 0, b'{']));
            let _ = out.send(Message::Text("not json".into()));
            reply_text(&out, json!({ "result": 5 }));
            reply_text(&out, json!({ "id": null, "method": "status", "params": { "ok": true } }));
            reply_text(&out, json!({ "id": "bm9ib2R5", "result": "orphan" }));
            reply_frame(&out, json!({ "id": id, "result": "survived" }), &[]);
        }
        "hang-up" => {
            let _ = out.send(Message::Close(None));
        }
        "never" => {}
        _ => reply_frame(
            &out,
            json!({ "id": id, "error": { "code": -32601, "message": "method not found" } }),
            &[],
        ),
    }
}
