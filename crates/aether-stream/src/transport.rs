use std::pin::Pin;

use bytes::Bytes;

use crate::errors::StreamError;
use crate::request::ChatRequest;

/// Response body as the consumer sees it: chunks in send order.
pub type ByteStream = Pin<Box<dyn futures::Stream<Item = Result<Bytes, StreamError>> + Send + 'static>>;

/// Opens a streaming chat response.
///
/// Implementations return once the backend has accepted the request; a
/// non-success status must be reported here as `StreamError::Transport`,
/// before any body bytes are handed out.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, StreamError>;
}
