//! Streaming-response consumer for the Aether chat client.
//!
//! The backend answers `POST /api/chat` with a chunked body of
//! `data: {"content": "..."}` lines ending in `data: [DONE]`. This crate turns
//! that body into ordered text deltas for a growing [`AssistantMessage`].
//!
//! Two layers are exposed:
//!
//! - [`StreamConsumer`] drives a [`FrameDecoder`] against any byte stream and
//!   reports to a [`StreamHandler`] through synchronous callbacks.
//! - [`ChatClient`] opens the HTTP request, runs a consumer on its own task and
//!   forwards [`ChatEvent`]s over a channel.
//!
//! ```no_run
//! use aether_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = ChatClient::from_config(ClientConfig::from_env()?)?;
//! let mut stream = client.stream(ChatRequest::new().user("Say hello"))?;
//!
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         ChatEvent::Delta { text, .. } => print!("{text}"),
//!         ChatEvent::Failed { error, .. } => eprintln!("stream error: {error}"),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Cooperative cancellation handles.
pub mod cancel;
/// Channel-based chat client.
pub mod chat;
/// Client configuration.
pub mod config;
/// Stream consumer, handler trait and consumer state machine.
pub mod consumer;
/// Byte-to-frame decoder.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Frame payload classification.
pub mod frame;
/// HTTP transport backed by `reqwest`.
pub mod http;
/// The growing assistant reply.
pub mod message;
/// Logging setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Chat request body.
pub mod request;
/// Events exposed by `ChatStream`.
pub mod stream;
/// Transport contract.
pub mod transport;

pub use cancel::{AbortHandle, CancelToken};
pub use chat::{ChatClient, ChatStream};
pub use config::ClientConfig;
pub use consumer::{
    CallbackHandler, ConsumeOptions, ConsumerState, StreamConsumer, StreamHandler, StreamOutcome,
};
pub use decoder::{Frame, FrameDecoder};
pub use errors::{ClientError, ErrorKind, StreamError};
pub use frame::{DONE_SENTINEL, FrameEvent};
pub use http::{HealthStatus, HttpTransport};
pub use message::{AssistantMessage, MessageStatus};
pub use observability::{init_observability, init_observability_with};
pub use request::{ChatMessage, ChatRequest, Role};
pub use stream::ChatEvent;
pub use transport::{ByteStream, ChatTransport};
