#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use signal_api::config::Config;
use signal_api::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config with defaults and no publish token.
pub fn test_config() -> Config {
    Config::default()
}

pub fn test_state() -> AppState {
    AppState::new(test_config())
}

/// Build a test app router with default config.
pub fn test_app() -> (Router, AppState) {
    test_app_with(test_config())
}

pub fn test_app_with(config: Config) -> (Router, AppState) {
    let state = AppState::new(config);
    let app = signal_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    start_ws_server_with(test_config()).await
}

pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState) {
    let (app, state) = test_app_with(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// A connected gateway client that has already received `hello`.
pub struct TestClient {
    pub id: String,
    pub ws: WsStream,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{addr}/gateway");
        let (mut ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("ws connect");

        let hello = next_text(&mut ws).await;
        assert_eq!(hello["t"], "hello");
        let id = hello["d"]["connectionId"]
            .as_str()
            .expect("connectionId present")
            .to_string();

        Self { id, ws }
    }

    pub async fn send(&mut self, event: &str, data: serde_json::Value) {
        let frame = serde_json::json!({ "t": event, "d": data });
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(tungstenite::Message::Text(text.to_string().into()))
            .await
            .expect("ws send");
    }

    /// Next text frame, skipping control frames.
    pub async fn recv(&mut self) -> serde_json::Value {
        next_text(&mut self.ws).await
    }

    /// Next frame, asserting its event name.
    pub async fn expect(&mut self, event: &str) -> serde_json::Value {
        let msg = self.recv().await;
        assert_eq!(msg["t"], event, "unexpected frame: {msg}");
        msg["d"].clone()
    }

    /// Assert that no text frame arrives within a short window.
    pub async fn expect_silence(&mut self) {
        let result = time::timeout(Duration::from_millis(250), next_text(&mut self.ws)).await;
        if let Ok(msg) = result {
            panic!("expected no frame, got {msg}");
        }
    }

    pub async fn join_room(&mut self, room_id: &str, name: &str) -> serde_json::Value {
        self.send("room:join", serde_json::json!({ "roomId": room_id, "name": name }))
            .await;
        self.expect("room:peers").await
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

async fn next_text(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse frame");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..50 {
        if check() {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
