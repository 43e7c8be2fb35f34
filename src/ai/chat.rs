//! Wire types shared by the chat relay endpoint and the conversation client.

use axum::response::sse::Event;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::locale::Locale;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_HISTORY_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub quantity: i32,
    pub price: i64,
}

/// What the shopper is looking at when they ask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PageContext {
    pub page_type: String,
    pub company: Option<String>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub page_context: Option<PageContext>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Product summary rendered as a card next to the assistant's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductCard {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ErrorPayload {
    message: String,
}

/// One server-sent event on the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Visual(Vec<ProductCard>),
    Text(String),
    Error(String),
    Done,
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::Visual(_) => "visual",
            RelayEvent::Text(_) => "text",
            RelayEvent::Error(_) => "error",
            RelayEvent::Done => "done",
        }
    }

    /// JSON payload carried in the `data` field. Text is JSON-encoded so
    /// newlines inside a chunk survive the line-based framing.
    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self {
            RelayEvent::Visual(cards) => serde_json::to_string(cards),
            RelayEvent::Text(text) => serde_json::to_string(text),
            RelayEvent::Error(message) => serde_json::to_string(&ErrorPayload {
                message: message.clone(),
            }),
            RelayEvent::Done => Ok("{}".to_string()),
        }
    }

    pub fn into_sse(self) -> Event {
        match self.data() {
            Ok(data) => Event::default().event(self.name()).data(data),
            Err(err) => {
                tracing::warn!(event = self.name(), error = %err, "failed to encode relay event");
                Event::default()
                    .event("error")
                    .data(r#"{"message":"encoding failed"}"#)
            }
        }
    }

    pub fn from_parts(name: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "visual" => RelayEvent::Visual(serde_json::from_str(data)?),
            "text" => RelayEvent::Text(serde_json::from_str(data)?),
            "error" => RelayEvent::Error(serde_json::from_str::<ErrorPayload>(data)?.message),
            "done" => RelayEvent::Done,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Reasons a chat request is refused before any streaming starts.
pub fn validate_request(request: &ChatRequest) -> Result<(), &'static str> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err("Message is required");
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err("Message is too long");
    }
    let session = request.session_id.trim();
    let valid_session = !session.is_empty()
        && session.len() <= 64
        && session
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_session {
        return Err("Invalid session id");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str, session_id: &str) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            session_id: session_id.into(),
            locale: Locale::Ar,
            cart: Vec::new(),
            page_context: None,
            history: Vec::new(),
        }
    }

    #[test]
    fn text_with_newlines_survives_framing() {
        let event = RelayEvent::Text("line one\nline two".into());
        let data = event.data().expect("encode");
        assert!(!data.contains('\n'));
        let decoded = RelayEvent::from_parts(event.name(), &data).expect("decode");
        assert_eq!(decoded, Some(event));
    }

    #[test]
    fn error_event_carries_message() {
        let decoded = RelayEvent::from_parts("error", r#"{"message":"انتهت المهلة"}"#)
            .expect("decode");
        assert_eq!(decoded, Some(RelayEvent::Error("انتهت المهلة".into())));
        assert_eq!(RelayEvent::from_parts("ping", "{}").expect("decode"), None);
    }

    #[test]
    fn request_defaults_apply() {
        let parsed: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","session_id":"ses_1"}"#).expect("parse");
        assert_eq!(parsed.locale, Locale::Ar);
        assert!(parsed.cart.is_empty());
        assert!(parsed.page_context.is_none());
    }

    #[test]
    fn validation_rules() {
        assert!(validate_request(&request("hello", "ses_abc-1")).is_ok());
        assert_eq!(validate_request(&request("   ", "ses_1")), Err("Message is required"));
        assert_eq!(
            validate_request(&request(&"x".repeat(MAX_MESSAGE_CHARS + 1), "ses_1")),
            Err("Message is too long")
        );
        assert_eq!(validate_request(&request("hi", "")), Err("Invalid session id"));
        assert_eq!(validate_request(&request("hi", "ses 1")), Err("Invalid session id"));
    }
}
