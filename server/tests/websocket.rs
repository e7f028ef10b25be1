//! End-to-end tests over a real socket: actix `HttpServer` on a free port,
//! `tokio-tungstenite` clients.

use std::net::TcpListener;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use coderoom_server::handlers;
use coderoom_server::server::{spawn_server, ServerHandle, ServerOptions};
use system::serde_json::{self, json, Value};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> (ServerHandle, String) {
    let server = spawn_server(ServerOptions::default());
    let listener = TcpListener::bind("127.0.0.1:0").expect("free port");
    let addr = listener.local_addr().expect("local addr");

    let handle = server.clone();
    let http = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(handle.clone()))
            .configure(handlers::root)
    })
    .workers(1)
    .listen(listener)
    .expect("listen")
    .run();
    actix_web::rt::spawn(http);

    (server, format!("ws://{}/ws", addr))
}

async fn open(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("websocket handshake");
    socket
}

async fn send(socket: &mut Socket, message: Value) {
    socket
        .send(Message::text(message.to_string()))
        .await
        .expect("socket open");
}

async fn recv(socket: &mut Socket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("message in time")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(_) = message {
            return serde_json::from_str(message.to_text().expect("utf-8")).expect("json");
        }
    }
}

async fn members_of(server: &ServerHandle, room_id: &str) -> Option<usize> {
    server
        .list_rooms()
        .await
        .expect("server running")
        .into_iter()
        .find(|room| room.room_id.as_str() == room_id)
        .map(|room| room.members)
}

#[actix_web::test]
async fn closing_the_socket_leaves_the_room() {
    let (server, url) = start_relay().await;
    let mut socket = open(&url).await;

    send(&mut socket, json!({"type": "CONNECTED_TO_ROOM", "roomId": "room", "joinerId": "A"})).await;
    assert_eq!(recv(&mut socket).await["type"], json!("START_CODE"));
    assert_eq!(members_of(&server, "room").await, Some(1));

    socket.close(None).await.expect("close handshake");

    timeout(Duration::from_secs(3), async {
        while members_of(&server, "room").await != Some(0) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("membership released after close");
}

#[actix_web::test]
async fn unreadable_frames_do_not_break_the_connection() {
    let (_server, url) = start_relay().await;
    let mut socket = open(&url).await;

    socket
        .send(Message::text("not json at all"))
        .await
        .expect("socket open");
    send(&mut socket, json!({"type": "SOMETHING_ELSE", "roomId": "room"})).await;
    send(&mut socket, json!({"type": "CODE_CHANGED", "senderId": "A"})).await;
    socket
        .send(Message::binary(vec![1u8, 2, 3]))
        .await
        .expect("socket open");

    send(&mut socket, json!({"type": "CONNECTED_TO_ROOM", "roomId": "room", "joinerId": "A"})).await;
    assert_eq!(
        recv(&mut socket).await,
        json!({
            "type": "START_CODE",
            "senderId": "A",
            "code": {"html": "", "css": "", "js": ""}
        })
    );
}

#[actix_web::test]
async fn edits_reach_the_other_socket() {
    let (_server, url) = start_relay().await;
    let mut a = open(&url).await;
    let mut b = open(&url).await;

    send(&mut a, json!({"type": "CONNECTED_TO_ROOM", "roomId": "room", "joinerId": "A"})).await;
    recv(&mut a).await;
    send(&mut b, json!({"type": "CONNECTED_TO_ROOM", "roomId": "room", "joinerId": "B"})).await;
    assert_eq!(recv(&mut a).await["senderId"], json!("B"));
    assert_eq!(recv(&mut b).await["senderId"], json!("B"));

    let code = json!({"html": "<b>", "css": "", "js": "", "ts": "let n = 1;"});
    send(
        &mut a,
        json!({"type": "CODE_CHANGED", "roomId": "room", "senderId": "A", "code": code, "tab": "ts"}),
    )
    .await;
    assert_eq!(
        recv(&mut b).await,
        json!({"type": "CODE_CHANGED", "senderId": "A", "code": code, "tab": "ts"})
    );
}
