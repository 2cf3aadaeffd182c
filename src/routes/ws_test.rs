use super::*;
use crate::state::test_helpers::{self, drain_events};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// IN-PROCESS DISPATCH
// =============================================================================

#[tokio::test]
async fn invalid_json_yields_error_frame() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new(Uuid::new_v4());

    let replies = process_inbound_text(&state, &mut session, "{not json").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].event, frame::ERROR);
    assert_eq!(replies[0].str_field("code"), Some("E_INVALID_FRAME"));
}

#[tokio::test]
async fn unknown_event_yields_error_frame() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new(Uuid::new_v4());

    let replies = process_inbound_text(&state, &mut session, r#"{"event":"teleport","data":{}}"#).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].str_field("code"), Some("E_UNKNOWN_EVENT"));
}

#[tokio::test]
async fn null_payload_is_accepted() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new(Uuid::new_v4());

    let replies = process_inbound_text(&state, &mut session, r#"{"event":"undo","data":null}"#).await;

    assert!(replies.is_empty(), "unexpected replies: {replies:?}");
}

#[tokio::test]
async fn valid_join_replies_through_channel_not_directly() {
    let state = test_helpers::test_app_state();
    let (client_id, mut rx) = {
        let mut hub = state.hub.write().await;
        test_helpers::connect(&mut hub, 8)
    };
    let mut session = Session::new(client_id);

    let replies = process_inbound_text(
        &state,
        &mut session,
        r#"{"event":"join-room","data":{"roomName":"lobby","username":"ada"}}"#,
    )
    .await;

    assert!(replies.is_empty());
    assert_eq!(drain_events(&mut rx), [frame::ROOM_JOINED]);
}

// =============================================================================
// END TO END
// =============================================================================

async fn spawn_server() -> SocketAddr {
    let state = test_helpers::test_app_state();
    let app = crate::routes::app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/api/ws"))
        .await
        .expect("ws connect");
    ws
}

async fn send(ws: &mut Client, event: &str, data: serde_json::Value) {
    let text = json!({"event": event, "data": data}).to_string();
    ws.send(WsMessage::Text(text.into())).await.expect("ws send");
}

async fn recv(ws: &mut Client) -> Frame {
    loop {
        let msg = timeout(Duration::from_millis(1000), ws.next())
            .await
            .expect("ws receive timed out")
            .expect("ws stream ended")
            .expect("ws error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("server frame is valid json");
        }
    }
}

async fn assert_silent(ws: &mut Client) {
    assert!(
        timeout(Duration::from_millis(100), ws.next()).await.is_err(),
        "expected no frame"
    );
}

#[tokio::test]
async fn two_clients_share_strokes_and_history() {
    let addr = spawn_server().await;
    let mut ada = connect(addr).await;
    let mut bob = connect(addr).await;

    send(&mut ada, "join-room", json!({"roomName": "e2e", "username": "ada"})).await;
    let joined = recv(&mut ada).await;
    assert_eq!(joined.event, frame::ROOM_JOINED);
    let ada_id = joined.str_field("userId").expect("userId").to_owned();

    send(&mut ada, "draw", json!({"tool": "pen", "color": "#111", "width": 2, "points": [[0, 0], [5, 5]]})).await;
    // Undo/redo echo back to the sender, so once both arrive the stroke is in the log.
    send(&mut ada, "undo", json!({})).await;
    send(&mut ada, "redo", json!({})).await;
    assert_eq!(recv(&mut ada).await.data.get("historyIndex"), Some(&json!(-1)));
    assert_eq!(recv(&mut ada).await.data.get("historyIndex"), Some(&json!(0)));

    send(&mut bob, "join-room", json!({"roomName": "e2e", "username": "bob"})).await;
    let bootstrap = recv(&mut bob).await;
    assert_eq!(bootstrap.event, frame::ROOM_JOINED);
    let state = bootstrap.data.get("drawingState").expect("drawingState");
    assert_eq!(state["historyIndex"], json!(0));
    assert_eq!(state["strokes"][0]["tool"], json!("pen"));
    assert_eq!(bootstrap.data["users"].as_array().map(Vec::len), Some(2));

    let announce = recv(&mut ada).await;
    assert_eq!(announce.event, frame::USER_JOINED);
    assert_eq!(announce.str_field("username"), Some("bob"));
    assert_eq!(recv(&mut ada).await.event, frame::USERS_UPDATE);

    send(&mut bob, "cursor-move", json!({"x": 7, "y": 9})).await;
    let cursor = recv(&mut ada).await;
    assert_eq!(cursor.event, frame::CURSOR_UPDATE);
    assert_eq!(cursor.f64_field("x"), Some(7.0));

    send(&mut ada, "undo", json!({})).await;
    for ws in [&mut ada, &mut bob] {
        let undo = recv(ws).await;
        assert_eq!(undo.event, frame::UNDO);
        assert_eq!(undo.data.get("historyIndex"), Some(&json!(-1)));
    }

    send(&mut bob, "undo", json!({})).await;
    assert_silent(&mut ada).await;
    assert_silent(&mut bob).await;

    drop(bob);
    let left = recv(&mut ada).await;
    assert_eq!(left.event, frame::USER_LEFT);
    let roster = recv(&mut ada).await;
    assert_eq!(roster.event, frame::USERS_UPDATE);
    let users = roster.data["users"].as_array().expect("users").clone();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"], json!(ada_id));
}

#[tokio::test]
async fn draw_is_echoed_verbatim_to_peers() {
    let addr = spawn_server().await;
    let mut ada = connect(addr).await;
    let mut bob = connect(addr).await;

    send(&mut ada, "join-room", json!({"roomName": "echo", "username": "ada"})).await;
    recv(&mut ada).await;
    send(&mut bob, "join-room", json!({"roomName": "echo", "username": "bob"})).await;
    recv(&mut bob).await;
    assert_eq!(recv(&mut ada).await.event, frame::USER_JOINED);
    assert_eq!(recv(&mut ada).await.event, frame::USERS_UPDATE);

    let stroke = json!({"tool": "eraser", "color": "#fff", "width": 12, "points": [{"x": 1.5, "y": 2.5}]});
    send(&mut ada, "draw", stroke.clone()).await;

    let echo = recv(&mut bob).await;
    assert_eq!(echo.event, frame::DRAW);
    assert_eq!(serde_json::to_value(&echo.data).expect("data"), stroke);
    assert_silent(&mut ada).await;
}

#[tokio::test]
async fn leave_room_closes_connection() {
    let addr = spawn_server().await;
    let mut ada = connect(addr).await;

    send(&mut ada, "join-room", json!({"roomName": "bye", "username": "ada"})).await;
    recv(&mut ada).await;
    send(&mut ada, "leave-room", json!({})).await;

    let closed = timeout(Duration::from_millis(1000), async {
        while let Some(Ok(msg)) = ada.next().await {
            if msg.is_close() {
                return true;
            }
        }
        true
    })
    .await
    .expect("server should close the socket");
    assert!(closed);
}

#[tokio::test]
async fn protocol_errors_go_to_sender_only() {
    let addr = spawn_server().await;
    let mut ada = connect(addr).await;

    send(&mut ada, "join-room", json!({"username": "ada"})).await;
    let err = recv(&mut ada).await;
    assert_eq!(err.event, frame::ERROR);
    assert_eq!(err.str_field("code"), Some("E_MISSING_FIELD"));

    send(&mut ada, "join-room", json!({"roomName": "once", "username": "ada"})).await;
    assert_eq!(recv(&mut ada).await.event, frame::ROOM_JOINED);

    send(&mut ada, "join-room", json!({"roomName": "twice", "username": "ada"})).await;
    let err = recv(&mut ada).await;
    assert_eq!(err.str_field("code"), Some("E_ALREADY_JOINED"));
}

#[tokio::test]
async fn rooms_endpoint_reports_live_rooms() {
    let addr = spawn_server().await;
    let mut ada = connect(addr).await;
    send(&mut ada, "join-room", json!({"roomName": "listed", "username": "ada"})).await;
    recv(&mut ada).await;

    let mut stream = TcpStream::connect(addr).await.expect("http connect");
    let request = format!("GET /api/rooms HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response)
        .await
        .expect("read response");

    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.contains(r#""name":"listed""#));
    assert!(response.contains(r#""participants":1"#));
}
