#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rpclink_client::config::ClientSection;
use rpclink_client::RpcClient;
use rpclink_core::error::RpcLinkError;

use support::{dead_address, FakeBackend};

fn status_log(client: &RpcClient) -> Arc<Mutex<Vec<bool>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    client
        .event_connection_status()
        .listen(move |open| sink.lock().unwrap().push(*open));
    log
}

#[tokio::test]
async fn exhausted_retries_name_the_address() {
    let address = dead_address().await;
    let mut section = ClientSection::for_address(address.clone());
    section.connect_attempts = 3;
    section.retry_delay_ms = 10;
    section.connect_timeout_ms = 1_000;
    let client = RpcClient::new(section);
    let log = status_log(&client);

    let started = Instant::now();
    let err = client.connect().await.unwrap_err();

    match &err {
        RpcLinkError::ConnectFailed { address: a, attempts, .. } => {
            assert_eq!(a, &address);
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.to_string().contains(&address));
    assert_eq!(err.code().as_str(), "CONNECT_FAILED");
    // Two sleeps between three attempts.
    assert!(started.elapsed() >= Duration::from_millis(20));

    assert!(!client.is_connected());
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(client.metrics().connect_attempts.get(&[("result", "error")]), 3);
}

#[tokio::test]
async fn open_and_close_are_signalled() {
    let backend = FakeBackend::start().await;
    let client = RpcClient::new(backend.section());
    let log = status_log(&client);

    client.connect().await.unwrap();
    assert!(client.is_connected());
    client.disconnect().await;
    assert!(!client.is_connected());

    assert_eq!(*log.lock().unwrap(), vec![true, false]);
    assert_eq!(client.metrics().sessions_open.get(&[]), 0);
}

#[tokio::test]
async fn disconnect_fails_pending_calls() {
    let backend = FakeBackend::start().await;
    let client = backend.client().await;

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.exec("never", None, None).await }
    });
    backend.wait_for("never", 1).await;
    client.disconnect().await;

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.code().as_str(), "CONNECTION_CLOSED");
    assert_eq!(client.pending_queries(), 0);
}

#[tokio::test]
async fn reconnect_starts_a_fresh_session() {
    let backend = FakeBackend::start().await;
    let client = RpcClient::new(backend.section());
    let log = status_log(&client);

    client.connect().await.unwrap();
    let stale = tokio::spawn({
        let client = client.clone();
        async move { client.exec("never", None, None).await }
    });
    backend.wait_for("never", 1).await;

    // Connecting again closes the old socket first.
    client.connect().await.unwrap();
    let err = stale.await.unwrap().unwrap_err();
    assert_eq!(err.code().as_str(), "CONNECTION_CLOSED");

    assert!(client.exec("get-version", None, None).await.is_ok());
    assert_eq!(backend.connections(), 2);
    assert_eq!(*log.lock().unwrap(), vec![true, false, true]);

    // Ids keep counting across sessions.
    let ids: Vec<_> = backend
        .received()
        .into_iter()
        .map(|r| r.envelope["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["MA==", "MQ=="]);
}

#[tokio::test]
async fn concurrent_connects_share_one_attempt() {
    let backend = FakeBackend::start().await;
    let client = RpcClient::new(backend.section());
    let log = status_log(&client);

    let (a, b) = tokio::join!(client.connect(), client.connect());
    a.unwrap();
    b.unwrap();

    client.exec("get-version", None, None).await.unwrap();
    assert_eq!(backend.connections(), 1);
    assert_eq!(*log.lock().unwrap(), vec![true]);
}

#[tokio::test]
async fn server_hang_up_is_signalled() {
    let backend = FakeBackend::start().await;
    let client = backend.client().await;
    let log = status_log(&client);

    let err = client.exec("hang-up", None, None).await.unwrap_err();
    assert_eq!(err.code().as_str(), "CONNECTION_CLOSED");
    assert_eq!(*log.lock().unwrap(), vec![false]);

    // The caller decides to come back.
    client.connect().await.unwrap();
    assert!(client.exec("get-version", None, None).await.is_ok());
    assert_eq!(*log.lock().unwrap(), vec![false, true]);
}
