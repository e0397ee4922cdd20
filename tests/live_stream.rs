//! End-to-end tests for the live stream over a real socket

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sublog::api::{serve_on, AppState};
use sublog::config::ServerConfig;
use sublog::storage::{LogRecord, LogStore};
use sublog::websocket::{Hub, HubConfig};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    hub: Hub,
    http: reqwest::Client,
    hub_task: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LogStore::open(dir.path().join("sublog.db")).unwrap());
        let (hub, hub_task) = Hub::spawn(HubConfig::default());
        let config = ServerConfig {
            frontend_dir: dir.path().join("frontend"),
            ..ServerConfig::default()
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let state = AppState::new(store, hub.clone(), config);
        tokio::spawn(serve_on(listener, state, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            hub,
            http: reqwest::Client::new(),
            hub_task,
            shutdown: Some(tx),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", self.addr))
            .await
            .unwrap();
        client
    }

    async fn wait_for_subscribers(&self, expected: usize) {
        tokio::time::timeout(WAIT, async {
            while self.hub.subscriber_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} subscribers, have {}",
                expected,
                self.hub.subscriber_count()
            )
        });
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Next pushed record, skipping control frames
async fn next_record(client: &mut Client) -> LogRecord {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("stream ended: {:?}", other),
            }
        }
    })
    .await
    .unwrap()
}

/// Wait for the server's close frame, skipping anything before it
async fn next_close(client: &mut Client) -> CloseFrame<'static> {
    tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(Some(frame)))) => return frame,
                Some(Ok(Message::Close(None))) => panic!("close frame without a code"),
                Some(Ok(_)) => continue,
                other => panic!("stream ended without a close frame: {:?}", other),
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_ingested_record_is_pushed() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    server.wait_for_subscribers(1).await;

    let response = server
        .http
        .post(server.url("/logs"))
        .json(&serde_json::json!({
            "level": "info",
            "message": "hello",
            "meta": {"requestId": "req-1"},
            "timestamp": "2024-03-01T12:30:00Z"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let record = next_record(&mut client).await;
    assert!(record.id > 0);
    assert_eq!(record.level.as_deref(), Some("info"));
    assert_eq!(record.message.as_deref(), Some("hello"));
    assert_eq!(record.metadata.as_deref(), Some(r#"{"requestId":"req-1"}"#));
    assert_eq!(record.timestamp.to_rfc3339(), "2024-03-01T12:30:00+00:00");
}

#[tokio::test]
async fn test_clear_reaches_every_client() {
    let server = TestServer::start().await;
    server
        .http
        .post(server.url("/logs"))
        .json(&serde_json::json!([{"message": "a"}, {"message": "b"}]))
        .send()
        .await
        .unwrap();

    let mut first = server.connect().await;
    let mut second = server.connect().await;
    server.wait_for_subscribers(2).await;

    let response = server
        .http
        .delete(server.url("/logs/all"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    for client in [&mut first, &mut second] {
        let record = next_record(client).await;
        assert_eq!(record.id, -1);
        assert!(record.level.is_none());
        assert!(record.message.is_none());
        assert!(record.metadata.is_none());
    }

    let recent: Vec<LogRecord> = server
        .http
        .get(server.url("/logs/recent"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let server = TestServer::start().await;
    let mut staying = server.connect().await;
    let mut leaving = server.connect().await;
    server.wait_for_subscribers(2).await;

    leaving.close(None).await.unwrap();
    server.wait_for_subscribers(1).await;

    // Abrupt drop without a close frame
    let dropped = server.connect().await;
    server.wait_for_subscribers(2).await;
    drop(dropped);
    server.wait_for_subscribers(1).await;

    server
        .http
        .post(server.url("/logs"))
        .json(&serde_json::json!({"message": "still here"}))
        .send()
        .await
        .unwrap();
    let record = next_record(&mut staying).await;
    assert_eq!(record.message.as_deref(), Some("still here"));
}

#[tokio::test]
async fn test_client_messages_are_ignored() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;
    server.wait_for_subscribers(1).await;

    client
        .send(Message::Text("hello server".to_string()))
        .await
        .unwrap();

    server
        .http
        .post(server.url("/logs"))
        .json(&serde_json::json!({"message": "after chatter"}))
        .send()
        .await
        .unwrap();

    let record = next_record(&mut client).await;
    assert_eq!(record.message.as_deref(), Some("after chatter"));
    assert_eq!(server.hub.subscriber_count(), 1);
}

#[tokio::test]
async fn test_hub_shutdown_closes_viewers() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;
    server.wait_for_subscribers(2).await;

    // Dropping the control loop drops every subscriber and closes its queue
    server.hub_task.abort();

    for client in [&mut first, &mut second] {
        let frame = next_close(client).await;
        assert_eq!(frame.code, CloseCode::Normal);
    }
}
