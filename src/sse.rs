//! Streaming timeline consumption.
//!
//! The server pushes newline-separated text:
//!
//! ```text
//! :thump
//! event: update
//! data: {"id":1,"content":"hi"}
//! event: delete
//! data: 42
//! ```
//!
//! Lines starting with `:` and blank lines are keep-alives. An `event: `
//! line names the kind of the next frame, the following `data: ` line
//! completes it. [`Demultiplexer`] is the synchronous state machine doing
//! the pairing; [`consume_stream`] drives it from a byte stream on a
//! background task and hands events over through a bounded queue.

use crate::decode::decode;
use crate::entities::{Notification, Status};
use crate::error::StreamError;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

const EVENT_PREFIX: &str = "event: ";
const DATA_PREFIX: &str = "data: ";

/// Default capacity of the queue between the reader task and the consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Event pushed by a streaming connection.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A new or reblogged status.
    Update(Box<Status>),
    /// A notification for the authenticated user.
    Notification(Box<Notification>),
    /// Id of a deleted status.
    Delete(u64),
}

/// Frame kind named by an `event: ` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Update,
    Notification,
    Delete,
}

impl EventKind {
    /// Parse an event name, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, StreamError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(EventKind::Update),
            "notification" => Ok(EventKind::Notification),
            "delete" => Ok(EventKind::Delete),
            _ => Err(StreamError::UnknownEvent(s.trim().to_string())),
        }
    }
}

/// A complete event/data pair.
#[derive(Debug)]
struct Frame<'a> {
    kind: EventKind,
    payload: &'a str,
}

impl Frame<'_> {
    fn into_event(self) -> Result<DomainEvent, StreamError> {
        match self.kind {
            EventKind::Update => {
                let status = decode::<Status>(self.payload)?;
                Ok(DomainEvent::Update(Box::new(status)))
            }
            EventKind::Notification => {
                let notification = decode::<Notification>(self.payload)?;
                Ok(DomainEvent::Notification(Box::new(notification)))
            }
            EventKind::Delete => self
                .payload
                .trim()
                .parse::<u64>()
                .map(DomainEvent::Delete)
                .map_err(|_| StreamError::InvalidDeleteId(self.payload.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum FrameState {
    #[default]
    Idle,
    HaveEventKind(EventKind),
}

/// Pairs `event: ` and `data: ` lines into [`DomainEvent`]s.
///
/// Holds at most one pending event kind. A `data: ` line without a pending
/// kind is dropped.
#[derive(Debug, Default)]
pub struct Demultiplexer {
    state: FrameState,
}

impl Demultiplexer {
    /// Create a demultiplexer in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, without its terminator.
    ///
    /// Returns the event completed by this line, if any. Errors are fatal
    /// for the stream.
    pub fn push_line(&mut self, line: &str) -> Result<Option<DomainEvent>, StreamError> {
        if line.is_empty() || line.starts_with(':') {
            trace!(line, "stream keep-alive");
            return Ok(None);
        }

        if let Some(kind) = line.strip_prefix(EVENT_PREFIX) {
            self.state = FrameState::HaveEventKind(EventKind::parse(kind)?);
            return Ok(None);
        }

        if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            return match std::mem::take(&mut self.state) {
                FrameState::Idle => {
                    warn!(payload, "dropping stream data without event");
                    Ok(None)
                }
                FrameState::HaveEventKind(kind) => Frame { kind, payload }.into_event().map(Some),
            };
        }

        // id:, retry: and anything else
        Ok(None)
    }
}

/// Splits a byte stream into lines.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD.
#[derive(Debug, Default)]
struct LineBuffer {
    buf: BytesMut,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };
        let pos = self.scanned + offset;
        self.scanned = 0;
        let line = self.buf.split_to(pos + 1);
        Some(Self::decode_line(&line[..pos]))
    }

    /// The unterminated tail left when the source ends.
    fn take_rest(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = self.buf.split();
        Some(Self::decode_line(&rest))
    }

    fn decode_line(bytes: &[u8]) -> String {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Cancellation handle for streaming connections.
///
/// Clones share the same state. Cancelling is idempotent.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal that is not cancelled yet.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// How a stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server closed the connection.
    Closed,
    /// The [`CancelSignal`] fired.
    Cancelled,
    /// An error was delivered as the last item.
    Failed,
}

#[derive(Debug)]
enum Message {
    Event(DomainEvent),
    Failed(StreamError),
    End(StreamEnd),
}

/// Live sequence of [`DomainEvent`]s from one connection.
///
/// Yields events in arrival order. An error item is always the last one.
/// Once the stream returns `None`, [`end`](Self::end) tells a graceful
/// close from a cancellation. Dropping the stream stops the reader and
/// releases the connection.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Message>,
    cancel: CancelSignal,
    end: Option<StreamEnd>,
}

impl EventStream {
    /// Request cancellation of this stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// How the stream ended, once it has.
    pub fn end(&self) -> Option<StreamEnd> {
        self.end
    }
}

impl Stream for EventStream {
    type Item = Result<DomainEvent, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.end.is_some() {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Message::Event(event))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Message::Failed(err))) => {
                self.end = Some(StreamEnd::Failed);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(Some(Message::End(end))) => {
                self.end = Some(end);
                Poll::Ready(None)
            }
            // reader task went away without saying why
            Poll::Ready(None) => {
                self.end = Some(StreamEnd::Failed);
                Poll::Ready(None)
            }
        }
    }
}

/// Consume a streaming response body.
///
/// Spawns the reader on the current tokio runtime and returns immediately.
/// Lines are decoded leniently: bytes that are not valid UTF-8 become
/// U+FFFD instead of failing the stream.
/// Uses a queue of [`DEFAULT_STREAM_BUFFER`] events; see
/// [`consume_stream_with_buffer`].
pub fn consume_stream<S, E>(source: S, cancel: CancelSignal) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    consume_stream_with_buffer(source, cancel, DEFAULT_STREAM_BUFFER)
}

/// Consume a streaming response body with a queue of `buffer` events.
///
/// When the queue is full the reader stops reading from `source` until the
/// consumer catches up.
pub fn consume_stream_with_buffer<S, E>(source: S, cancel: CancelSignal, buffer: usize) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    let reader = Reader {
        lines: LineBuffer::default(),
        demux: Demultiplexer::new(),
        cancelled: cancel.subscribe(),
        tx,
    };
    tokio::spawn(reader.run(source));

    EventStream {
        rx,
        cancel,
        end: None,
    }
}

/// Why the reader stopped.
enum Outcome {
    End(StreamEnd),
    Fail(StreamError),
    /// The consumer dropped the stream.
    Abandoned,
}

struct Reader {
    lines: LineBuffer,
    demux: Demultiplexer,
    cancelled: watch::Receiver<bool>,
    tx: mpsc::Sender<Message>,
}

impl Reader {
    async fn run<S, E>(mut self, source: S)
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    {
        // The source lives only as long as the read; the connection is
        // released before the end marker waits for queue space.
        let outcome = {
            let source = std::pin::pin!(source);
            self.read(source).await
        };

        let message = match outcome {
            Outcome::End(end) => {
                debug!(?end, "stream ended");
                Message::End(end)
            }
            Outcome::Fail(err) => {
                warn!(error = %err, "stream failed");
                Message::Failed(err)
            }
            Outcome::Abandoned => {
                debug!("stream dropped by consumer");
                return;
            }
        };

        // The consumer may be gone already, or never come back for the marker.
        tokio::select! {
            _ = self.tx.closed() => {}
            _ = self.tx.send(message) => {}
        }
    }

    async fn read<S, E>(&mut self, mut source: Pin<&mut S>) -> Outcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        loop {
            while let Some(line) = self.lines.next_line() {
                if let Err(outcome) = self.handle_line(&line).await {
                    return outcome;
                }
            }

            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancelled) => return Outcome::End(StreamEnd::Cancelled),
                _ = self.tx.closed() => return Outcome::Abandoned,
                chunk = source.next() => match chunk {
                    Some(Ok(bytes)) => self.lines.extend(&bytes),
                    Some(Err(err)) => return Outcome::Fail(StreamError::Transport(err.into())),
                    None => {
                        if let Some(line) = self.lines.take_rest() {
                            if let Err(outcome) = self.handle_line(&line).await {
                                return outcome;
                            }
                        }
                        return Outcome::End(StreamEnd::Closed);
                    }
                },
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<(), Outcome> {
        if *self.cancelled.borrow() {
            return Err(Outcome::End(StreamEnd::Cancelled));
        }

        match self.demux.push_line(line) {
            Ok(Some(event)) => self.emit(Message::Event(event)).await,
            Ok(None) => Ok(()),
            Err(err) => Err(Outcome::Fail(err)),
        }
    }

    async fn emit(&mut self, message: Message) -> Result<(), Outcome> {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.cancelled) => Err(Outcome::End(StreamEnd::Cancelled)),
            sent = self.tx.send(message) => sent.map_err(|_| Outcome::Abandoned),
        }
    }
}
