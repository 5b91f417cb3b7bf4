use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};

use guidepost_api::routes;
use guidepost_api::state::{AppState, AppStateInner};
use guidepost_db::Database;
use guidepost_types::events::GatewayEvent;
use guidepost_types::models::{Participant, PresenceSnapshot, Role};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    student: i64,
    counselor: i64,
}

impl TestServer {
    async fn start() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let student = db.create_student("Ada").unwrap().id;
        let counselor = db.create_counselor("Grace").unwrap().id;
        let state = AppStateInner::build(db, false);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = routes::router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            student,
            counselor,
        }
    }

    async fn connect(&self, query: &str) -> Ws {
        let url = format!("ws://{}/gateway?{}", self.addr, query);
        let (ws, _) = connect_async(&url).await.unwrap();
        ws
    }

    async fn connect_student(&self) -> Ws {
        self.connect(&format!("studentId={}", self.student)).await
    }

    async fn connect_counselor(&self) -> Ws {
        self.connect(&format!("counselorId={}", self.counselor)).await
    }

    async fn registry_len(&self) -> usize {
        self.state.lifecycle.registry().len().await
    }

    /// Poll until the registry holds `expected` connections.
    async fn wait_for_len(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.registry_len().await != expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "registry never reached {} connections",
                expected
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Next gateway event on `ws`, skipping control frames.
async fn next_event(ws: &mut Ws) -> GatewayEvent {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a gateway event");
        match frame {
            Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

async fn next_presence(ws: &mut Ws) -> PresenceSnapshot {
    match next_event(ws).await {
        GatewayEvent::PresenceSnapshot(snapshot) => snapshot,
        other => panic!("expected PresenceSnapshot, got {:?}", other),
    }
}

async fn assert_quiet(ws: &mut Ws) {
    let frame = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(frame.is_err(), "unexpected frame: {:?}", frame);
}

/// Drain `ws` until the server closes it.
async fn wait_closed(ws: &mut Ws) {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("connection was never closed");
        match frame {
            None | Some(Ok(WsMessage::Close(_))) | Some(Err(_)) => return,
            Some(Ok(_)) => continue,
        }
    }
}

async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(WsMessage::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn ready_comes_before_the_first_snapshot() {
    let server = TestServer::start().await;
    let mut student = server.connect_student().await;

    assert_eq!(
        next_event(&mut student).await,
        GatewayEvent::Ready {
            participant: Participant::student(server.student)
        }
    );
    let snapshot = next_presence(&mut student).await;
    assert_eq!(snapshot.students, vec![server.student]);
    assert!(snapshot.counselors.is_empty());
    assert_eq!(server.registry_len().await, 1);
}

#[tokio::test]
async fn garbage_is_ignored_and_presence_requests_answer_only_the_caller() {
    let server = TestServer::start().await;

    let mut student = server.connect_student().await;
    next_event(&mut student).await;
    next_presence(&mut student).await;

    let mut counselor = server.connect_counselor().await;
    next_event(&mut counselor).await;
    let seen_by_counselor = next_presence(&mut counselor).await;
    let seen_by_student = next_presence(&mut student).await;
    assert_eq!(seen_by_student, seen_by_counselor);
    assert_eq!(seen_by_student.counselors, vec![server.counselor]);
    assert_eq!(seen_by_student.students, vec![server.student]);

    send_text(&mut student, "definitely not a command").await;
    send_text(&mut student, "{\"type\":\"Shout\"}").await;
    send_text(&mut student, "{\"type\":\"RequestPresence\"}").await;

    assert_eq!(next_presence(&mut student).await, seen_by_student);
    assert_quiet(&mut counselor).await;
    assert_eq!(server.registry_len().await, 2);
}

#[tokio::test]
async fn stored_message_is_pushed_over_the_socket() {
    let server = TestServer::start().await;

    let mut counselor = server.connect_counselor().await;
    next_event(&mut counselor).await;
    next_presence(&mut counselor).await;

    let sent = server
        .state
        .conversations
        .send(server.student, server.counselor, Role::Student, "office hours?".into())
        .await
        .unwrap();

    match next_event(&mut counselor).await {
        GatewayEvent::MessageCreate(message) => assert_eq!(message, sent),
        other => panic!("expected MessageCreate, got {:?}", other),
    }
}

#[tokio::test]
async fn second_connection_for_same_identity_closes_the_first() {
    let server = TestServer::start().await;

    let mut first = server.connect_student().await;
    next_event(&mut first).await;
    next_presence(&mut first).await;

    let mut second = server.connect_student().await;
    next_event(&mut second).await;
    assert_eq!(next_presence(&mut second).await.students, vec![server.student]);

    wait_closed(&mut first).await;
    assert_eq!(server.registry_len().await, 1);

    // The replacement keeps working after the old socket is gone.
    send_text(&mut second, "{\"type\":\"RequestPresence\"}").await;
    assert_eq!(next_presence(&mut second).await.students, vec![server.student]);
    assert_eq!(server.registry_len().await, 1);
}

#[tokio::test]
async fn closing_the_transport_unregisters_and_rebroadcasts() {
    let server = TestServer::start().await;

    let mut student = server.connect_student().await;
    next_event(&mut student).await;
    next_presence(&mut student).await;

    let mut counselor = server.connect_counselor().await;
    next_event(&mut counselor).await;
    next_presence(&mut counselor).await;
    assert_eq!(next_presence(&mut student).await.counselors, vec![server.counselor]);

    counselor.send(WsMessage::Close(None)).await.unwrap();

    let after = next_presence(&mut student).await;
    assert!(after.counselors.is_empty());
    assert_eq!(after.students, vec![server.student]);
    server.wait_for_len(1).await;

    drop(student);
    server.wait_for_len(0).await;
}
