//! Shopping assistant: the Gemini client, the streaming chat relay served by
//! the API, and a client-side conversation holder that talks to the relay.

pub mod chat;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod relay;
pub mod store;
