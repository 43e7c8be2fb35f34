//! Errors raised while talking to the generative-AI provider or the chat relay.

use thiserror::Error;

use crate::locale::Locale;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("request timed out")]
    Timeout,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("stream error: {0}")]
    Stream(String),

    /// Error reported by the chat relay, already localized.
    #[error("relay error: {0}")]
    Relay(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AiError {
    /// Short message that is safe to show to a shopper.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match self {
            AiError::Timeout => locale.pick(
                "انتهت مهلة الاستجابة. يرجى المحاولة مرة أخرى.",
                "The assistant took too long to respond. Please try again.",
            ),
            AiError::RateLimited(_) => locale.pick(
                "عدد الطلبات كبير حالياً. يرجى الانتظار قليلاً ثم المحاولة مجدداً.",
                "Too many requests right now. Please wait a moment and try again.",
            ),
            AiError::Http(err) if err.is_timeout() => locale.pick(
                "انتهت مهلة الاستجابة. يرجى المحاولة مرة أخرى.",
                "The assistant took too long to respond. Please try again.",
            ),
            AiError::Api { status, .. } if *status >= 500 => locale.pick(
                "الخدمة غير متاحة مؤقتاً. يرجى المحاولة لاحقاً.",
                "The assistant is temporarily unavailable. Please try again later.",
            ),
            _ => locale.pick(
                "حدث خطأ أثناء معالجة طلبك. يرجى المحاولة مرة أخرى.",
                "Something went wrong while handling your request. Please try again.",
            ),
        }
    }
}

/// Error body returned by the provider.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_follow_locale() {
        assert!(AiError::Timeout.user_message(Locale::Ar).contains("مهلة"));
        assert!(AiError::Timeout.user_message(Locale::En).contains("too long"));
        assert!(
            AiError::RateLimited(30)
                .user_message(Locale::En)
                .contains("Too many")
        );
    }

    #[test]
    fn server_errors_are_distinguished() {
        let upstream = AiError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let bad_request = AiError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert!(upstream.user_message(Locale::En).contains("unavailable"));
        assert!(bad_request.user_message(Locale::En).contains("went wrong"));
    }

    #[test]
    fn api_error_deserialization() {
        let json = r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let body: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(body.error.code, 429);
        assert_eq!(body.error.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
    }
}
