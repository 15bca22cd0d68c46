use crate::consumer::StreamHandler;
use crate::errors::StreamError;

/// Lifecycle of an assistant message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Deltas are still being appended.
    Streaming,
    Completed,
    Cancelled,
    /// The transport failed; content holds whatever arrived before it did.
    Failed,
}

/// The growing assistant reply for one stream.
///
/// Identity is fixed at creation. Content only grows while the status is
/// `Streaming`; the first finalization wins and later ones are ignored.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssistantMessage {
    id: uuid::Uuid,
    content: String,
    status: MessageStatus,
    error: Option<String>,
}

impl Default for AssistantMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl AssistantMessage {
    /// Creates an empty streaming message with a random id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4())
    }

    /// Creates an empty streaming message with a caller-chosen id.
    pub fn with_id(id: uuid::Uuid) -> Self {
        Self {
            id,
            content: String::new(),
            status: MessageStatus::Streaming,
            error: None,
        }
    }

    /// Returns the message id.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Accumulated delta text, without any error indicator.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// Error recorded by [`fail`](Self::fail), if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns `true` once the message has left `Streaming`.
    pub fn is_finalized(&self) -> bool {
        self.status != MessageStatus::Streaming
    }

    /// Appends a delta. Returns `false` if the message is already finalized.
    pub fn apply_delta(&mut self, text: &str) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.content.push_str(text);
        true
    }

    /// Marks the message completed. Returns `false` if already finalized.
    pub fn complete(&mut self) -> bool {
        self.finalize(MessageStatus::Completed)
    }

    /// Marks the message cancelled, keeping received content.
    pub fn cancel(&mut self) -> bool {
        self.finalize(MessageStatus::Cancelled)
    }

    /// Marks the message failed. Partial content is retained.
    pub fn fail(&mut self, error: &StreamError) -> bool {
        if !self.finalize(MessageStatus::Failed) {
            return false;
        }
        self.error = Some(error.to_string());
        true
    }

    /// Text to show the user: the content, followed by a distinct error
    /// indicator when the stream failed.
    pub fn rendered(&self) -> String {
        match (&self.status, &self.error) {
            (MessageStatus::Failed, Some(error)) if self.content.is_empty() => {
                format!("[error: {error}]")
            }
            (MessageStatus::Failed, Some(error)) => format!("{}\n\n[error: {error}]", self.content),
            _ => self.content.clone(),
        }
    }

    fn finalize(&mut self, status: MessageStatus) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.status = status;
        true
    }
}

impl StreamHandler for AssistantMessage {
    fn on_delta(&mut self, text: &str) {
        self.apply_delta(text);
    }

    fn on_done(&mut self) {
        self.complete();
    }

    fn on_error(&mut self, error: &StreamError) {
        self.fail(error);
    }

    fn on_cancelled(&mut self) {
        self.cancel();
    }
}
