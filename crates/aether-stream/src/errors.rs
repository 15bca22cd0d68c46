use std::time::Duration;

/// Classification of everything that can go wrong (or stop) during a stream.
///
/// Only `TransportFailure` is ever surfaced through
/// [`StreamHandler::on_error`](crate::consumer::StreamHandler::on_error). The
/// other kinds exist so logs and callers can name the outcome precisely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection could not be established, returned a non-success status, or
    /// was reset before a terminal frame arrived.
    TransportFailure,
    /// A frame payload did not match the expected schema. Dropped locally.
    MalformedFrame,
    /// The caller aborted the stream. Not a failure.
    CancellationRequested,
}

/// Terminal stream failure passed to `on_error` and carried by
/// `ChatEvent::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Transport or stream I/O failed.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// No chunk arrived within the configured read timeout.
    #[error("transport read timed out after {timeout:?}")]
    ReadTimeout { timeout: Duration },
}

impl StreamError {
    /// Creates a transport error without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    /// Creates a transport error for a non-success HTTP status.
    pub fn status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Every terminal stream error is a transport failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransportFailure
    }

    /// Returns the HTTP status code when the backend rejected the request.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status_code, .. } => *status_code,
            Self::ReadTimeout { .. } => None,
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request passed to the client.
    #[error("validation error: {0}")]
    Validation(String),
    /// The stream ended with a transport failure.
    #[error(transparent)]
    Stream(StreamError),
    /// The stream was aborted by the caller.
    #[error("cancelled")]
    Cancelled,
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<StreamError> for ClientError {
    fn from(value: StreamError) -> Self {
        ClientError::Stream(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_errors_are_transport_failures() {
        let reset = StreamError::transport("connection reset");
        let timeout = StreamError::ReadTimeout {
            timeout: Duration::from_secs(3),
        };
        assert_eq!(reset.kind(), ErrorKind::TransportFailure);
        assert_eq!(timeout.kind(), ErrorKind::TransportFailure);
        assert_eq!(timeout.status_code(), None);
    }

    #[test]
    fn status_errors_keep_code_and_message() {
        let err = StreamError::status(502, "bad gateway");
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.to_string(), "transport failure: bad gateway");
        assert!(matches!(ClientError::from(err), ClientError::Stream(_)));
    }
}
