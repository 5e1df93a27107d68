//! Network read loop for one stream session.
//!
//! The driver races every await against cancellation and the absolute
//! deadline, resets the inactivity timer on each chunk, and feeds complete
//! lines to the session strictly in arrival order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::decoder::LineDecoder;
use crate::errors::{StreamError, TimeoutKind, ToolError};
use crate::session::{FinalMessage, LineOutcome, StreamSession};
use crate::tool::ToolHandler;
use crate::view::MessageView;

/// Response body as a stream of byte chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Connecting,
    Reading,
    Done,
    Error,
    Aborted,
}

/// Requests cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Cancellation surfaces as [`DriveOutcome::Aborted`].
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of an [`AbortHandle`].
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once abort is requested. Pends forever if every handle is dropped.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Terminal callbacks of a stream. All default to no-ops.
pub trait StreamObserver {
    fn on_complete(&mut self, _message: &FinalMessage) {}
    fn on_error(&mut self, _error: &StreamError) {}
    fn on_abort(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

/// Non-error termination of a stream.
#[derive(Clone, Debug, PartialEq)]
pub enum DriveOutcome {
    Completed(FinalMessage),
    Aborted,
}

enum Stop {
    Aborted,
    Failed(StreamError),
}

impl From<StreamError> for Stop {
    fn from(err: StreamError) -> Self {
        Stop::Failed(err)
    }
}

enum Flow {
    Continue,
    EndOfInput,
}

pub struct StreamDriver {
    config: StreamConfig,
    tools: Option<Arc<dyn ToolHandler>>,
    state: DriverState,
}

impl StreamDriver {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            tools: None,
            state: DriverState::Idle,
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolHandler>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Connects, reads to completion and finalizes or cleans up the session.
    ///
    /// Returns `Err` for network, HTTP, timeout and provider failures after the
    /// session showed its error notice. Abort is reported as
    /// `Ok(DriveOutcome::Aborted)`.
    pub async fn run<V, C>(
        &mut self,
        connect: C,
        session: &mut StreamSession<'_, V>,
        mut abort: AbortSignal,
        observer: &mut dyn StreamObserver,
    ) -> Result<DriveOutcome, StreamError>
    where
        V: MessageView + ?Sized,
        C: Future<Output = Result<ByteStream, StreamError>>,
    {
        if self.state != DriverState::Idle {
            return Err(StreamError::Protocol(
                "stream driver can only run once".into(),
            ));
        }
        let session_id = session.id();
        let started = Instant::now();
        match self.pump(connect, session, &mut abort).await {
            Ok(()) => {
                self.transition(session_id, DriverState::Done);
                let message = session.finish();
                info!(
                    %session_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = message.text.chars().count(),
                    deltas = message.stats.deltas,
                    duplicates = message.stats.duplicates,
                    parse_errors = message.stats.parse_errors,
                    "stream completed"
                );
                observer.on_complete(&message);
                Ok(DriveOutcome::Completed(message))
            }
            Err(Stop::Aborted) => {
                self.transition(session_id, DriverState::Aborted);
                session.abort();
                info!(%session_id, "stream aborted");
                observer.on_abort();
                Ok(DriveOutcome::Aborted)
            }
            Err(Stop::Failed(err)) => {
                self.transition(session_id, DriverState::Error);
                session.fail(&err);
                warn!(%session_id, kind = err.kind(), error = %err, "stream failed");
                observer.on_error(&err);
                Err(err)
            }
        }
    }

    async fn pump<V, C>(
        &mut self,
        connect: C,
        session: &mut StreamSession<'_, V>,
        abort: &mut AbortSignal,
    ) -> Result<(), Stop>
    where
        V: MessageView + ?Sized,
        C: Future<Output = Result<ByteStream, StreamError>>,
    {
        self.config.validate()?;
        let session_id = session.id();
        let mut absolute = Box::pin(tokio::time::sleep(self.config.absolute_timeout));

        self.transition(session_id, DriverState::Connecting);
        let connect = std::pin::pin!(connect);
        let mut stream = tokio::select! {
            biased;
            _ = abort.aborted() => return Err(Stop::Aborted),
            _ = &mut absolute => return Err(Stop::Failed(StreamError::Timeout(TimeoutKind::Absolute))),
            connected = connect => connected?,
        };
        if abort.is_aborted() {
            return Err(Stop::Aborted);
        }

        self.transition(session_id, DriverState::Reading);
        let mut decoder = LineDecoder::new();
        let inactivity = self.config.inactivity_timeout;
        loop {
            let next = tokio::select! {
                biased;
                _ = abort.aborted() => return Err(Stop::Aborted),
                _ = &mut absolute => return Err(Stop::Failed(StreamError::Timeout(TimeoutKind::Absolute))),
                next = tokio::time::timeout(inactivity, stream.next()) => next,
            };
            let chunk = match next {
                Err(_) => return Err(Stop::Failed(StreamError::Timeout(TimeoutKind::Inactivity))),
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(err))) => return Err(Stop::Failed(err)),
                Ok(None) => {
                    if let Some(line) = decoder.finish() {
                        self.process_line(&line, session, abort, &mut absolute).await?;
                    }
                    return Ok(());
                }
            };
            for line in decoder.push_chunk(&chunk) {
                if let Flow::EndOfInput = self
                    .process_line(&line, session, abort, &mut absolute)
                    .await?
                {
                    return Ok(());
                }
            }
        }
    }

    async fn process_line<V>(
        &self,
        line: &str,
        session: &mut StreamSession<'_, V>,
        abort: &mut AbortSignal,
        absolute: &mut Pin<Box<Sleep>>,
    ) -> Result<Flow, Stop>
    where
        V: MessageView + ?Sized,
    {
        if abort.is_aborted() {
            return Err(Stop::Aborted);
        }
        match session.handle_line(line) {
            LineOutcome::Done => Ok(Flow::EndOfInput),
            LineOutcome::Failed(message) => Err(Stop::Failed(StreamError::Provider(message))),
            LineOutcome::ToolCall(call) => {
                let Some(tools) = self.tools.clone() else {
                    debug!(session_id = %session.id(), tool = %call.name, "no tool handler registered");
                    session.apply_tool_outcome(&call, Err(ToolError::UnknownTool(call.name.clone())));
                    return Ok(Flow::Continue);
                };
                let outcome = tokio::select! {
                    biased;
                    _ = abort.aborted() => return Err(Stop::Aborted),
                    _ = absolute => return Err(Stop::Failed(StreamError::Timeout(TimeoutKind::Absolute))),
                    outcome = tools.execute(&call) => outcome,
                };
                if abort.is_aborted() {
                    return Err(Stop::Aborted);
                }
                session.apply_tool_outcome(&call, outcome);
                Ok(Flow::Continue)
            }
            LineOutcome::Skipped
            | LineOutcome::Malformed(_)
            | LineOutcome::Duplicate
            | LineOutcome::Ignored(_)
            | LineOutcome::Applied(_) => Ok(Flow::Continue),
        }
    }

    fn transition(&mut self, session_id: uuid::Uuid, next: DriverState) {
        debug!(%session_id, from = ?self.state, to = ?next, "stream driver state");
        self.state = next;
    }
}
