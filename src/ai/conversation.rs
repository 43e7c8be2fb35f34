//! Client-side conversation state for the shopping assistant.
//!
//! A [`Conversation`] owns the session id, the message list and the page/cart
//! context sent with each turn. Replies are read from the relay's event stream
//! as they arrive, guarded by a watchdog so a stalled stream never hangs the
//! caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::locale::Locale;

use super::chat::{
    CartLine, ChatRequest, ChatRole, ChatTurn, MAX_HISTORY_TURNS, PageContext, ProductCard,
    RelayEvent, validate_request,
};
use super::error::AiError;
use super::gemini::{drain_utf8, extract_sse_event};
use super::store::{ConversationStore, StoreError};

pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<Vec<ProductCard>>,
    /// Set when the reply stopped early; `content` holds what arrived.
    #[serde(default)]
    pub interrupted: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            visual: None,
            interrupted: false,
            created_at: Utc::now(),
        }
    }
}

/// Incremental progress of a reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChatUpdate<'a> {
    Visual(&'a [ProductCard]),
    /// The reply text accumulated so far.
    Text(&'a str),
}

#[derive(Debug, Error)]
pub enum SendError {
    /// The exchange failed. When nothing was received the user's message is
    /// taken back out of the conversation and returned in `restored_input`.
    #[error("chat failed: {error}")]
    Chat {
        error: AiError,
        restored_input: Option<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SendError {
    /// Message to show the shopper for this failure.
    pub fn display_message(&self, locale: Locale) -> String {
        match self {
            SendError::Chat {
                error: AiError::Relay(message),
                ..
            } => message.clone(),
            SendError::Chat { error, .. } => error.user_message(locale).to_string(),
            SendError::Store(_) => locale
                .pick("تعذر حفظ المحادثة.", "The conversation could not be saved.")
                .to_string(),
        }
    }

    pub fn restored_input(&self) -> Option<&str> {
        match self {
            SendError::Chat { restored_input, .. } => restored_input.as_deref(),
            SendError::Store(_) => None,
        }
    }
}

pub fn new_session_id() -> String {
    format!("ses_{}", Uuid::new_v4().simple())
}

pub struct Conversation<S: ConversationStore> {
    http: reqwest::Client,
    endpoint: String,
    store: S,
    session_id: String,
    locale: Locale,
    messages: Vec<ChatMessage>,
    page_context: Option<PageContext>,
    cart: Vec<CartLine>,
    watchdog: Duration,
}

impl<S: ConversationStore> Conversation<S> {
    /// Resume the stored session, or start a new one.
    pub async fn open(
        endpoint: impl Into<String>,
        locale: Locale,
        store: S,
    ) -> Result<Self, StoreError> {
        let session_id = match store.session_id().await? {
            Some(id) => id,
            None => {
                let id = new_session_id();
                store.set_session_id(&id).await?;
                id
            }
        };
        let messages = store.messages(&session_id).await?;
        tracing::debug!(%session_id, restored = messages.len(), "conversation opened");

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            store,
            session_id,
            locale,
            messages,
            page_context: None,
            cart: Vec::new(),
            watchdog: WATCHDOG_TIMEOUT,
        })
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
    }

    pub fn set_page_context(&mut self, context: Option<PageContext>) {
        self.page_context = context;
    }

    pub fn set_cart(&mut self, cart: Vec<CartLine>) {
        self.cart = cart;
    }

    /// Drop the stored history and continue under a fresh session id.
    pub async fn reset(&mut self) -> Result<(), StoreError> {
        self.store.clear(&self.session_id).await?;
        self.session_id = new_session_id();
        self.store.set_session_id(&self.session_id).await?;
        self.messages.clear();
        Ok(())
    }

    fn history(&self) -> Vec<ChatTurn> {
        let start = self.messages.len().saturating_sub(MAX_HISTORY_TURNS);
        self.messages[start..]
            .iter()
            .filter(|m| !m.content.trim().is_empty())
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }

    /// Send one message and stream the reply through `on_update`.
    pub async fn send<F>(&mut self, text: &str, mut on_update: F) -> Result<&ChatMessage, SendError>
    where
        F: FnMut(ChatUpdate<'_>),
    {
        let request = ChatRequest {
            message: text.trim().to_string(),
            session_id: self.session_id.clone(),
            locale: self.locale,
            cart: self.cart.clone(),
            page_context: self.page_context.clone(),
            history: self.history(),
        };
        if let Err(reason) = validate_request(&request) {
            return Err(SendError::Chat {
                error: AiError::Api {
                    status: 400,
                    message: reason.to_string(),
                },
                restored_input: Some(text.to_string()),
            });
        }

        self.messages.push(ChatMessage::new(ChatRole::User, request.message.clone()));

        let mut reply = String::new();
        let mut visual: Option<Vec<ProductCard>> = None;
        let exchange = read_reply(
            &self.http,
            &self.endpoint,
            &request,
            &mut reply,
            &mut visual,
            &mut on_update,
        );
        let outcome = match tokio::time::timeout(self.watchdog, exchange).await {
            Ok(result) => result,
            Err(_) => Err(AiError::Timeout),
        };

        let produced_output = !reply.is_empty() || visual.is_some();
        let failure = match outcome {
            Ok(()) => None,
            Err(error) if !produced_output => {
                tracing::warn!(session_id = %self.session_id, error = %error, "chat failed before any reply");
                self.messages.pop();
                self.store.save_messages(&self.session_id, &self.messages).await?;
                return Err(SendError::Chat {
                    error,
                    restored_input: Some(request.message),
                });
            }
            Err(error) => {
                tracing::warn!(session_id = %self.session_id, error = %error, "chat reply interrupted");
                Some(error)
            }
        };

        let mut assistant = ChatMessage::new(ChatRole::Assistant, reply);
        assistant.visual = visual;
        assistant.interrupted = failure.is_some();
        self.messages.push(assistant);
        self.store.save_messages(&self.session_id, &self.messages).await?;

        if let Some(error) = failure {
            return Err(SendError::Chat {
                error,
                restored_input: None,
            });
        }
        self.messages
            .last()
            .ok_or_else(|| SendError::Chat {
                error: AiError::Stream("reply was not recorded".into()),
                restored_input: None,
            })
    }
}

async fn read_reply<F>(
    http: &reqwest::Client,
    endpoint: &str,
    request: &ChatRequest,
    reply: &mut String,
    visual: &mut Option<Vec<ProductCard>>,
    on_update: &mut F,
) -> Result<(), AiError>
where
    F: FnMut(ChatUpdate<'_>),
{
    let response = http
        .post(endpoint)
        .header(ACCEPT, "text/event-stream")
        .json(request)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(AiError::RateLimited(retry_after));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/data/error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        return Err(AiError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let mut bytes = response.bytes_stream();
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = String::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk.map_err(|e| AiError::Stream(e.to_string()))?;
        pending.extend_from_slice(&chunk);
        buffer.push_str(&drain_utf8(&mut pending));

        while let Some(raw) = extract_sse_event(&mut buffer) {
            match parse_relay_event(&raw)? {
                Some(RelayEvent::Visual(cards)) => {
                    let cards = visual.insert(cards);
                    on_update(ChatUpdate::Visual(cards.as_slice()));
                }
                Some(RelayEvent::Text(text)) => {
                    reply.push_str(&text);
                    on_update(ChatUpdate::Text(reply.as_str()));
                }
                Some(RelayEvent::Error(message)) => return Err(AiError::Relay(message)),
                Some(RelayEvent::Done) => return Ok(()),
                None => {}
            }
        }
    }

    Err(AiError::Stream("stream closed before completion".into()))
}

/// Decode one framed relay event; comments and unknown events yield `None`.
pub fn parse_relay_event(raw: &str) -> Result<Option<RelayEvent>, AiError> {
    let mut name = None;
    let mut data: Vec<&str> = Vec::new();
    for line in raw.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            name = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    let Some(name) = name else {
        return Ok(None);
    };
    RelayEvent::from_parts(name, &data.join("\n"))
        .map_err(|e| AiError::Parse(format!("Invalid {name} event: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with("ses_"));
        assert_eq!(a.len(), 4 + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn parses_framed_events() {
        let text = parse_relay_event("event: text\ndata: \"hello\\nworld\"").expect("parse");
        assert_eq!(text, Some(RelayEvent::Text("hello\nworld".into())));
        assert_eq!(parse_relay_event(":").expect("comment"), None);
        assert_eq!(
            parse_relay_event("event: done\ndata: {}").expect("done"),
            Some(RelayEvent::Done)
        );
        assert!(matches!(
            parse_relay_event("event: visual\ndata: nope"),
            Err(AiError::Parse(_))
        ));
    }

    #[test]
    fn relay_errors_are_shown_verbatim() {
        let err = SendError::Chat {
            error: AiError::Relay("الخدمة غير متاحة".into()),
            restored_input: Some("hi".into()),
        };
        assert_eq!(err.display_message(Locale::En), "الخدمة غير متاحة");
        assert_eq!(err.restored_input(), Some("hi"));

        let timeout = SendError::Chat {
            error: AiError::Timeout,
            restored_input: None,
        };
        assert!(timeout.display_message(Locale::En).contains("too long"));
    }
}
