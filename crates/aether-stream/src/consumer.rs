//! Drives a [`FrameDecoder`] against a live response body.
//!
//! The read loop is sequential: one chunk is decoded and dispatched before the
//! next read starts, so deltas reach the handler in exact wire order. Each read
//! races the cancel token and the optional read timeout.

use std::ops::ControlFlow;
use std::time::Duration;

use futures::{Stream, StreamExt as _};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::decoder::{Frame, FrameDecoder};
use crate::errors::{ErrorKind, StreamError};
use crate::frame::FrameEvent;

/// Receives the outcome of a stream, one callback at a time.
///
/// Exactly one of `on_done`, `on_error` or (when acknowledgment is enabled)
/// `on_cancelled` fires per stream, after every `on_delta`.
pub trait StreamHandler {
    fn on_delta(&mut self, text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, error: &StreamError);
    /// Only called when [`ConsumeOptions::acknowledge_cancel`] is set.
    fn on_cancelled(&mut self) {}
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_delta(&mut self, text: &str) {
        (**self).on_delta(text);
    }

    fn on_done(&mut self) {
        (**self).on_done();
    }

    fn on_error(&mut self, error: &StreamError) {
        (**self).on_error(error);
    }

    fn on_cancelled(&mut self) {
        (**self).on_cancelled();
    }
}

/// Adapts closures to [`StreamHandler`].
///
/// Cancellation is ignored unless a closure is attached with
/// [`on_cancelled`](Self::on_cancelled).
pub struct CallbackHandler<D, F, E, C = fn()> {
    on_delta: D,
    on_done: F,
    on_error: E,
    on_cancelled: C,
}

impl<D, F, E> CallbackHandler<D, F, E>
where
    D: FnMut(&str),
    F: FnMut(),
    E: FnMut(&StreamError),
{
    /// Builds a handler from the delta, done and error callbacks.
    pub fn new(on_delta: D, on_done: F, on_error: E) -> Self {
        Self {
            on_delta,
            on_done,
            on_error,
            on_cancelled: || {},
        }
    }
}

impl<D, F, E, C> CallbackHandler<D, F, E, C> {
    /// Attaches a callback fired when an acknowledged cancellation ends the stream.
    pub fn on_cancelled<C2>(self, on_cancelled: C2) -> CallbackHandler<D, F, E, C2>
    where
        C2: FnMut(),
    {
        CallbackHandler {
            on_delta: self.on_delta,
            on_done: self.on_done,
            on_error: self.on_error,
            on_cancelled,
        }
    }
}

impl<D, F, E, C> StreamHandler for CallbackHandler<D, F, E, C>
where
    D: FnMut(&str),
    F: FnMut(),
    E: FnMut(&StreamError),
    C: FnMut(),
{
    fn on_delta(&mut self, text: &str) {
        (self.on_delta)(text);
    }

    fn on_done(&mut self) {
        (self.on_done)();
    }

    fn on_error(&mut self, error: &StreamError) {
        (self.on_error)(error);
    }

    fn on_cancelled(&mut self) {
        (self.on_cancelled)();
    }
}

/// Consumer lifecycle. `Idle -> Streaming -> {Completed, Cancelled, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ConsumerState {
    /// Returns `true` for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Streaming)
                | (Self::Streaming, Self::Completed | Self::Cancelled | Self::Failed)
        )
    }
}

/// Per-stream consumer behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Longest wait for a single chunk before the stream is failed.
    /// `None` waits forever (cancellation still interrupts the wait).
    pub read_timeout: Option<Duration>,
    /// Fire `on_cancelled` when the stream is aborted.
    pub acknowledge_cancel: bool,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(60)),
            acknowledge_cancel: false,
        }
    }
}

impl ConsumeOptions {
    /// Sets the per-chunk read timeout; `None` waits forever.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enables [`StreamHandler::on_cancelled`] on abort.
    pub fn acknowledge_cancel(mut self, acknowledge: bool) -> Self {
        self.acknowledge_cancel = acknowledge;
        self
    }
}

/// Terminal result of [`StreamConsumer::consume`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { deltas: u64 },
    Cancelled { deltas: u64 },
    Failed { deltas: u64, error: StreamError },
}

impl StreamOutcome {
    /// Terminal consumer state this outcome corresponds to.
    pub fn state(&self) -> ConsumerState {
        match self {
            Self::Completed { .. } => ConsumerState::Completed,
            Self::Cancelled { .. } => ConsumerState::Cancelled,
            Self::Failed { .. } => ConsumerState::Failed,
        }
    }

    /// Number of deltas delivered to the handler.
    pub fn deltas(&self) -> u64 {
        match self {
            Self::Completed { deltas }
            | Self::Cancelled { deltas }
            | Self::Failed { deltas, .. } => *deltas,
        }
    }
}

enum Read<T> {
    Item(T),
    Eof,
    TimedOut(Duration),
    Cancelled,
}

enum Terminal {
    Completed,
    Cancelled,
    Failed(StreamError),
}

/// Single-use consumer for one response body.
///
/// `consume` takes `self`, so a consumer cannot be restarted once it has
/// reached a terminal state.
#[derive(Debug)]
pub struct StreamConsumer {
    id: uuid::Uuid,
    decoder: FrameDecoder,
    state: ConsumerState,
    options: ConsumeOptions,
    deltas: u64,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new(ConsumeOptions::default())
    }
}

impl StreamConsumer {
    /// Creates an idle consumer with a fresh decoder.
    pub fn new(options: ConsumeOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            decoder: FrameDecoder::new(),
            state: ConsumerState::Idle,
            options,
            deltas: 0,
        }
    }

    /// Identifier used to correlate this consumer's log lines.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Reads `body` to a terminal state, dispatching frames to `handler`.
    ///
    /// `body` is dropped exactly once, before the terminal callback fires.
    pub async fn consume<S, B, E, H>(
        mut self,
        body: S,
        handler: &mut H,
        mut cancel: CancelToken,
    ) -> StreamOutcome
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<StreamError>,
        H: StreamHandler + ?Sized,
    {
        self.transition(ConsumerState::Streaming);
        let mut body = body;

        let terminal = loop {
            if cancel.is_cancelled() {
                break Terminal::Cancelled;
            }
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => Read::Cancelled,
                read = read_next(&mut body, self.options.read_timeout) => read,
            };
            match read {
                Read::Item(Ok(chunk)) => {
                    let chunk = chunk.as_ref();
                    let frames = self.decoder.push(chunk);
                    debug!(consumer = %self.id, bytes = chunk.len(), frames = frames.len(), "decoded chunk");
                    if let ControlFlow::Break(terminal) = self.dispatch(frames, handler, &cancel) {
                        break terminal;
                    }
                }
                Read::Item(Err(err)) => break Terminal::Failed(err.into()),
                Read::TimedOut(timeout) => break Terminal::Failed(StreamError::ReadTimeout { timeout }),
                Read::Cancelled => break Terminal::Cancelled,
                Read::Eof => {
                    let tail: Vec<Frame> = self.decoder.flush().into_iter().collect();
                    if let ControlFlow::Break(terminal) = self.dispatch(tail, handler, &cancel) {
                        break terminal;
                    }
                    debug!(consumer = %self.id, "transport ended without sentinel");
                    break Terminal::Completed;
                }
            }
        };

        drop(body);
        debug!(consumer = %self.id, "transport released");
        self.finish(terminal, handler)
    }

    fn dispatch<H>(
        &mut self,
        frames: Vec<Frame>,
        handler: &mut H,
        cancel: &CancelToken,
    ) -> ControlFlow<Terminal>
    where
        H: StreamHandler + ?Sized,
    {
        for frame in frames {
            if cancel.is_cancelled() {
                return ControlFlow::Break(Terminal::Cancelled);
            }
            match FrameEvent::classify(&frame.payload) {
                FrameEvent::ContentDelta { text } => {
                    if text.is_empty() {
                        continue;
                    }
                    debug!(consumer = %self.id, seq = self.deltas, "content delta");
                    handler.on_delta(&text);
                    self.deltas = self.deltas.saturating_add(1);
                }
                FrameEvent::StreamEnd => return ControlFlow::Break(Terminal::Completed),
                FrameEvent::Malformed { raw } => {
                    debug!(consumer = %self.id, kind = ?ErrorKind::MalformedFrame, raw = %raw, "dropping malformed frame");
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn finish<H>(mut self, terminal: Terminal, handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        let deltas = self.deltas;
        match terminal {
            Terminal::Completed => {
                self.transition(ConsumerState::Completed);
                info!(consumer = %self.id, deltas, "stream completed");
                handler.on_done();
                StreamOutcome::Completed { deltas }
            }
            Terminal::Cancelled => {
                self.transition(ConsumerState::Cancelled);
                info!(consumer = %self.id, deltas, kind = ?ErrorKind::CancellationRequested, "stream cancelled");
                if self.options.acknowledge_cancel {
                    handler.on_cancelled();
                }
                StreamOutcome::Cancelled { deltas }
            }
            Terminal::Failed(error) => {
                self.transition(ConsumerState::Failed);
                warn!(consumer = %self.id, deltas, error = %error, "stream failed");
                handler.on_error(&error);
                StreamOutcome::Failed { deltas, error }
            }
        }
    }

    fn transition(&mut self, next: ConsumerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal consumer transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }
}

async fn read_next<S, T>(body: &mut S, timeout: Option<Duration>) -> Read<T>
where
    S: Stream<Item = T> + Unpin,
{
    let next = match timeout {
        Some(limit) => match tokio::time::timeout(limit, body.next()).await {
            Ok(next) => next,
            Err(_) => return Read::TimedOut(limit),
        },
        None => body.next().await,
    };
    match next {
        Some(item) => Read::Item(item),
        None => Read::Eof,
    }
}
