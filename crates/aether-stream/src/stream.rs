use crate::errors::StreamError;
use crate::message::AssistantMessage;

/// Events exposed by [`ChatStream`](crate::chat::ChatStream).
///
/// Every stream yields `Started`, zero or more `Delta`s in wire order, and
/// exactly one terminal event.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// First event for every stream.
    Started { message_id: uuid::Uuid },
    /// Incremental text; `seq` starts at 0 and increases by one.
    Delta {
        message_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Terminal success event with the finished message.
    Completed { message: AssistantMessage },
    /// Terminal failure; `message` keeps the content received before it.
    Failed {
        error: StreamError,
        message: AssistantMessage,
    },
    /// Terminal event after the caller aborted the stream.
    Cancelled { message: AssistantMessage },
}

impl ChatEvent {
    /// Returns `true` for the event that ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}
