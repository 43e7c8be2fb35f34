use std::{convert::Infallible, time::Duration};

use axum::{
    Json, Router,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::post,
};
use futures::{Stream, StreamExt, stream};
use holding_portal_api::{
    ai::{
        chat::{ChatRequest, ChatRole, ProductCard, RelayEvent},
        conversation::{ChatUpdate, Conversation, SendError},
        error::AiError,
        store::{JsonFileStore, MemoryStore},
    },
    locale::Locale,
};
use uuid::Uuid;

fn card() -> ProductCard {
    ProductCard {
        id: Uuid::new_v4(),
        slug: "olive-oil-1l".into(),
        name: "Olive Oil".into(),
        price: 399,
        image_url: None,
        in_stock: true,
    }
}

fn sse(events: Vec<RelayEvent>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(stream::iter(events).map(|e| Ok(e.into_sse())))
}

fn stalled(events: Vec<RelayEvent>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let head = stream::iter(events).map(|e| Ok(e.into_sse()));
    Sse::new(head.chain(stream::pending()))
}

async fn complete(Json(request): Json<ChatRequest>) -> Response {
    let greeting = if request.history.is_empty() { "Hello" } else { "Again" };
    sse(vec![
        RelayEvent::Visual(vec![card()]),
        RelayEvent::Text(greeting.into()),
        RelayEvent::Text(" world\nsecond line".into()),
        RelayEvent::Done,
    ])
    .into_response()
}

async fn relay_error() -> Response {
    sse(vec![
        RelayEvent::Error("الخدمة غير متاحة مؤقتاً".into()),
        RelayEvent::Done,
    ])
    .into_response()
}

async fn unavailable() -> Response {
    let body = serde_json::json!({
        "message": "Service Unavailable",
        "data": { "error": "Service Unavailable AI provider is not configured" },
    });
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

async fn silent() -> Response {
    stalled(Vec::new()).into_response()
}

async fn partial() -> Response {
    stalled(vec![RelayEvent::Text("Partial answer".into())]).into_response()
}

async fn spawn_relay() -> String {
    let app = Router::new()
        .route("/chat", post(complete))
        .route("/error", post(relay_error))
        .route("/down", post(unavailable))
        .route("/silent", post(silent))
        .route("/partial", post(partial));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn reply_streams_and_persists() {
    let base = spawn_relay().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("chat.json");

    let mut convo = Conversation::open(format!("{base}/chat"), Locale::En, JsonFileStore::new(&path))
        .await
        .expect("open");
    let session = convo.session_id().to_string();

    let mut seen_text = Vec::new();
    let mut seen_cards = 0;
    let reply = convo
        .send("do you sell olive oil?", |update| match update {
            ChatUpdate::Visual(cards) => seen_cards = cards.len(),
            ChatUpdate::Text(text) => seen_text.push(text.to_string()),
        })
        .await
        .expect("reply");

    assert_eq!(reply.role, ChatRole::Assistant);
    assert_eq!(reply.content, "Hello world\nsecond line");
    assert!(!reply.interrupted);
    assert_eq!(reply.visual.as_ref().map(Vec::len), Some(1));
    assert_eq!(seen_cards, 1);
    assert_eq!(seen_text, vec!["Hello", "Hello world\nsecond line"]);

    let reopened = Conversation::open(format!("{base}/chat"), Locale::En, JsonFileStore::new(&path))
        .await
        .expect("reopen");
    assert_eq!(reopened.session_id(), session);
    assert_eq!(reopened.messages().len(), 2);
    assert_eq!(reopened.messages()[0].content, "do you sell olive oil?");
}

#[tokio::test]
async fn follow_up_sends_history() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/chat"), Locale::Ar, MemoryStore::new())
        .await
        .expect("open");

    convo.send("first", |_| {}).await.expect("first");
    let second = convo.send("second", |_| {}).await.expect("second");
    assert!(second.content.starts_with("Again"));
    assert_eq!(convo.messages().len(), 4);
}

#[tokio::test]
async fn relay_error_before_output_restores_input() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/error"), Locale::Ar, MemoryStore::new())
        .await
        .expect("open");

    let err = convo.send("مرحبا", |_| {}).await.expect_err("error");
    assert_eq!(err.restored_input(), Some("مرحبا"));
    assert_eq!(err.display_message(Locale::Ar), "الخدمة غير متاحة مؤقتاً");
    assert!(convo.messages().is_empty());
}

#[tokio::test]
async fn http_error_surfaces_server_message() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/down"), Locale::En, MemoryStore::new())
        .await
        .expect("open");

    let err = convo.send("hello", |_| {}).await.expect_err("error");
    match &err {
        SendError::Chat {
            error: AiError::Api { status, message },
            restored_input,
        } => {
            assert_eq!(*status, 503);
            assert!(message.contains("not configured"));
            assert_eq!(restored_input.as_deref(), Some("hello"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.display_message(Locale::En).contains("unavailable"));
}

#[tokio::test]
async fn watchdog_fires_on_silent_stream() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/silent"), Locale::En, MemoryStore::new())
        .await
        .expect("open")
        .with_watchdog(Duration::from_millis(300));

    let err = convo.send("anyone there?", |_| {}).await.expect_err("timeout");
    assert!(matches!(
        err,
        SendError::Chat {
            error: AiError::Timeout,
            ..
        }
    ));
    assert_eq!(err.restored_input(), Some("anyone there?"));
    assert!(convo.messages().is_empty());
}

#[tokio::test]
async fn partial_reply_is_kept_as_interrupted() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/partial"), Locale::En, MemoryStore::new())
        .await
        .expect("open")
        .with_watchdog(Duration::from_millis(300));

    let err = convo.send("tell me more", |_| {}).await.expect_err("timeout");
    assert_eq!(err.restored_input(), None);

    let messages = convo.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Partial answer");
    assert!(messages[1].interrupted);
}

#[tokio::test]
async fn reset_starts_a_fresh_session() {
    let base = spawn_relay().await;
    let mut convo = Conversation::open(format!("{base}/chat"), Locale::En, MemoryStore::new())
        .await
        .expect("open");
    convo.send("hello", |_| {}).await.expect("reply");
    let old = convo.session_id().to_string();

    convo.reset().await.expect("reset");
    assert_ne!(convo.session_id(), old);
    assert!(convo.messages().is_empty());
}
