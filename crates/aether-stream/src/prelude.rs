//! Common imports for typical client usage.
//!
//! Re-exports the types an application needs to start a stream, watch its
//! events and render the resulting message.
pub use crate::{
    AbortHandle, AssistantMessage, ChatClient, ChatEvent, ChatRequest, ChatStream, ClientConfig,
    ClientError, MessageStatus, Role, StreamError,
};
