use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cancel::{AbortHandle, CancelToken};
use crate::config::ClientConfig;
use crate::consumer::{ConsumeOptions, StreamConsumer, StreamHandler, StreamOutcome};
use crate::errors::{ClientError, StreamError};
use crate::http::HttpTransport;
use crate::message::AssistantMessage;
use crate::request::ChatRequest;
use crate::stream::ChatEvent;
use crate::transport::{ByteStream, ChatTransport};

/// Entry point for streaming chat replies.
///
/// Each call to [`stream`](Self::stream) runs on its own task with its own
/// consumer and decoder; streams share nothing but the transport.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn ChatTransport>,
    options: ConsumeOptions,
}

impl ChatClient {
    /// Creates a client over any transport with default consumer options.
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            options: ConsumeOptions::default(),
        }
    }

    /// Builds an HTTP-backed client.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let options = config.consume_options();
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)).consume_options(options))
    }

    /// Overrides consumer options for streams started by this client.
    pub fn consume_options(mut self, options: ConsumeOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the request and starts streaming the reply.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stream(&self, request: ChatRequest) -> Result<ChatStream, ClientError> {
        request.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_handle, cancel) = CancelToken::pair();
        let message = AssistantMessage::new();
        let message_id = message.id();

        tokio::spawn(stream_task(
            self.transport.clone(),
            request,
            // The channel always reports cancellation as a terminal event.
            self.options.clone().acknowledge_cancel(true),
            message,
            tx,
            final_tx,
            cancel,
        ));

        Ok(ChatStream {
            message_id,
            rx,
            final_rx,
            abort_handle,
            saw_terminal: false,
        })
    }

    /// Streams to completion and returns the reply text.
    pub async fn collect(&self, request: ChatRequest) -> Result<String, ClientError> {
        let message = self.stream(request)?.finish().await?;
        Ok(message.content().to_string())
    }
}

/// Handle to one running stream.
///
/// Use `next_event()` to observe deltas as they arrive and `finish()` to get
/// the final message. Dropping the handle aborts the stream.
pub struct ChatStream {
    message_id: uuid::Uuid,
    rx: mpsc::UnboundedReceiver<ChatEvent>,
    final_rx: oneshot::Receiver<(AssistantMessage, StreamOutcome)>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl ChatStream {
    /// Returns the id of the assistant message this stream builds.
    pub fn message_id(&self) -> uuid::Uuid {
        self.message_id
    }

    /// Returns a handle that can cancel the stream.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. Returns `None` once the channel is closed.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        let event = self.rx.recv().await;
        if event.as_ref().is_some_and(ChatEvent::is_terminal) {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream and returns the completed message.
    ///
    /// Cancellation and transport failures are errors here; use
    /// [`finish_message`](Self::finish_message) to keep the partial content.
    pub async fn finish(mut self) -> Result<AssistantMessage, ClientError> {
        let (message, outcome) = self.drain().await?;
        match outcome {
            StreamOutcome::Completed { .. } => Ok(message),
            StreamOutcome::Cancelled { .. } => Err(ClientError::Cancelled),
            StreamOutcome::Failed { error, .. } => Err(ClientError::Stream(error)),
        }
    }

    /// Drains the stream and returns the final message whatever the outcome.
    pub async fn finish_message(mut self) -> Result<AssistantMessage, ClientError> {
        Ok(self.drain().await?.0)
    }

    async fn drain(&mut self) -> Result<(AssistantMessage, StreamOutcome), ClientError> {
        while !self.saw_terminal {
            match self.rx.recv().await {
                Some(event) if event.is_terminal() => self.saw_terminal = true,
                Some(_) => {}
                None => break,
            }
        }
        (&mut self.final_rx).await.map_err(|_| {
            ClientError::protocol_msg(format!(
                "stream task ended without final result (message={})",
                self.message_id
            ))
        })
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        if !self.saw_terminal {
            self.abort_handle.abort();
        }
    }
}

/// Forwards consumer callbacks to the event channel while building the message.
struct ChannelHandler {
    message: AssistantMessage,
    tx: mpsc::UnboundedSender<ChatEvent>,
    seq: u64,
}

impl ChannelHandler {
    fn emit(&self, event: ChatEvent) {
        if self.tx.send(event).is_err() {
            debug!(message_id = %self.message.id(), "chat stream receiver dropped");
        }
    }
}

impl StreamHandler for ChannelHandler {
    fn on_delta(&mut self, text: &str) {
        self.message.apply_delta(text);
        self.emit(ChatEvent::Delta {
            message_id: self.message.id(),
            seq: self.seq,
            text: text.to_string(),
        });
        self.seq = self.seq.saturating_add(1);
    }

    fn on_done(&mut self) {
        self.message.complete();
        self.emit(ChatEvent::Completed {
            message: self.message.clone(),
        });
    }

    fn on_error(&mut self, error: &StreamError) {
        self.message.fail(error);
        self.emit(ChatEvent::Failed {
            error: error.clone(),
            message: self.message.clone(),
        });
    }

    fn on_cancelled(&mut self) {
        self.message.cancel();
        self.emit(ChatEvent::Cancelled {
            message: self.message.clone(),
        });
    }
}

async fn stream_task(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    options: ConsumeOptions,
    message: AssistantMessage,
    tx: mpsc::UnboundedSender<ChatEvent>,
    final_tx: oneshot::Sender<(AssistantMessage, StreamOutcome)>,
    mut cancel: CancelToken,
) {
    let message_id = message.id();
    let mut handler = ChannelHandler {
        message,
        tx,
        seq: 0,
    };
    handler.emit(ChatEvent::Started { message_id });
    info!(message_id = %message_id, messages = request.messages.len(), "chat stream started");

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        opened = open_body(transport.as_ref(), &request, options.read_timeout) => Some(opened),
    };

    let outcome = match opened {
        Some(Ok(body)) => {
            StreamConsumer::new(options)
                .consume(body, &mut handler, cancel)
                .await
        }
        Some(Err(error)) => {
            warn!(message_id = %message_id, error = %error, "failed to open chat stream");
            handler.on_error(&error);
            StreamOutcome::Failed { deltas: 0, error }
        }
        None => {
            handler.on_cancelled();
            StreamOutcome::Cancelled { deltas: 0 }
        }
    };

    let _ = final_tx.send((handler.message, outcome));
}

/// Opens the response body, waiting at most `limit` for the backend to answer.
async fn open_body(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    limit: Option<Duration>,
) -> Result<ByteStream, StreamError> {
    let Some(limit) = limit else {
        return transport.open(request).await;
    };
    tokio::time::timeout(limit, transport.open(request))
        .await
        .map_err(|_| StreamError::ReadTimeout { timeout: limit })?
}
