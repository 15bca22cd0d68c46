/// Reserved payload that ends a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Meaning of one decoded frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Incremental text to append to the assistant message.
    ContentDelta { text: String },
    /// The backend sent the `[DONE]` sentinel.
    StreamEnd,
    /// Payload did not match `{"content": "<text>"}`; the raw payload is kept
    /// for diagnostics only.
    Malformed { raw: String },
}

impl FrameEvent {
    /// Classifies a frame payload.
    ///
    /// The sentinel is matched after trimming surrounding whitespace. Anything
    /// that is not the sentinel and not a JSON object with a string `content`
    /// field is `Malformed`; extra fields are ignored.
    pub fn classify(payload: &str) -> Self {
        if payload.trim() == DONE_SENTINEL {
            return Self::StreamEnd;
        }
        let value = serde_json::from_str::<serde_json::Value>(payload).ok();
        match value
            .as_ref()
            .and_then(|v| v.as_object())
            .and_then(|obj| obj.get("content"))
            .and_then(|v| v.as_str())
        {
            Some(text) => Self::ContentDelta {
                text: text.to_string(),
            },
            None => Self::Malformed {
                raw: payload.to_string(),
            },
        }
    }
}
