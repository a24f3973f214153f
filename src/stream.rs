//! Async host integration for the stream engine.
//!
//! The engine itself is synchronous; a production host runs it on one
//! consumer task fed by a transport reader. This module provides that shape
//! in two flavors:
//!
//! - [`StreamDriver::spawn`] is push-based: it owns a [`ChunkSource`] and a
//!   [`StreamEngine`] on a spawned task and emits [`StreamEvent`]s through a
//!   bounded channel with a [`CancellationToken`] for shutdown. When the
//!   channel is full the producer awaits, so backpressure propagates to the
//!   transport reader; a source that would rather drop chunks than block
//!   must do so itself, and dropped chunks surface downstream as resync and
//!   gap events exactly like transport loss.
//! - [`EventStream`] is pull-based: a `Stream` combinator that turns any
//!   stream of byte chunks into a stream of [`StreamEvent`]s for direct
//!   composition with stream adapters.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{StreamEngine, StreamEvent};
use crate::transport::TransportSignal;
use crate::Result;

/// One poll of a chunk source.
#[derive(Debug)]
pub enum SourcePoll {
    /// A raw transport chunk (0 bytes to a few KB).
    Chunk(Vec<u8>),
    /// A transport-level condition; the driver forwards it to the engine.
    Signal(TransportSignal),
    /// The source is exhausted (normal termination).
    Closed,
}

/// Asynchronous supplier of raw transport chunks.
///
/// Implementations wrap whatever actually reads the device (a USB bulk
/// reader, a serial port, a capture file) and translate their failure modes
/// into [`TransportSignal`]s. Returning `Err` is reserved for faults in the
/// adapter itself and tears the driver down after a bounded number of
/// retries.
#[async_trait::async_trait]
pub trait ChunkSource: Send + 'static {
    async fn recv(&mut self) -> Result<SourcePoll>;
}

/// Handles returned by [`StreamDriver::spawn`].
pub struct DriverChannels {
    /// Decoded events, in stream order.
    pub events: ReceiverStream<StreamEvent>,
    /// Cancel to shut the reader task down.
    pub cancel: CancellationToken,
}

/// Spawns the read-feed-emit loop for one device stream.
pub struct StreamDriver;

impl StreamDriver {
    /// Spawn the driver task. `capacity` bounds the event channel; a slow
    /// consumer backpressures the source through it.
    pub fn spawn<S>(source: S, engine: StreamEngine, capacity: usize) -> DriverChannels
    where
        S: ChunkSource,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::read_task(source, engine, tx, cancel_task).await;
        });

        DriverChannels { events: ReceiverStream::new(rx), cancel }
    }

    async fn read_task<S>(
        mut source: S,
        mut engine: StreamEngine,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) where
        S: ChunkSource,
    {
        info!("stream driver task started");
        let mut chunk_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stream driver cancelled");
                    break;
                }
                polled = source.recv() => polled,
            };

            match polled {
                Ok(SourcePoll::Chunk(chunk)) => {
                    chunk_count += 1;
                    error_count = 0;
                    match engine.feed(&chunk) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(event).await.is_err() {
                                    debug!("event receiver dropped, shutting down");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            // BufferOverflow or a defunct engine; either way
                            // this instance is done.
                            error!("engine error after {chunk_count} chunks: {err}");
                            break;
                        }
                    }
                }
                Ok(SourcePoll::Signal(signal)) => {
                    engine.apply_signal(signal);
                    if !signal.is_recoverable() {
                        error!("fatal transport signal, shutting down");
                        break;
                    }
                }
                Ok(SourcePoll::Closed) => {
                    info!("chunk source ended after {chunk_count} chunks");
                    break;
                }
                Err(err) => {
                    error_count += 1;
                    error!("source error ({error_count}/{MAX_ERRORS}): {err}");
                    if error_count >= MAX_ERRORS {
                        error!("too many source errors, shutting down");
                        break;
                    }
                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff =
                        std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("stream driver task ended ({chunk_count} chunks processed)");
    }
}

pin_project! {
    /// Adapts a stream of byte chunks into a stream of [`StreamEvent`]s.
    ///
    /// A feed error (buffer overflow) ends the stream; the partially
    /// consumed engine remains inspectable through [`EventStream::engine`].
    pub struct EventStream<S> {
        #[pin]
        chunks: S,
        engine: StreamEngine,
        pending: VecDeque<StreamEvent>,
        done: bool,
    }
}

impl<S> EventStream<S> {
    pub fn new(chunks: S, engine: StreamEngine) -> Self {
        Self { chunks, engine, pending: VecDeque::new(), done: false }
    }

    /// The engine driving this stream, for health and rate queries.
    pub fn engine(&self) -> &StreamEngine {
        &self.engine
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = Vec<u8>>,
{
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            if *this.done {
                return Poll::Ready(None);
            }

            match this.chunks.as_mut().poll_next(cx) {
                Poll::Ready(Some(chunk)) => match this.engine.feed(&chunk) {
                    Ok(events) => this.pending.extend(events),
                    Err(err) => {
                        warn!("event stream ending on engine error: {err}");
                        *this.done = true;
                        return Poll::Ready(None);
                    }
                },
                Poll::Ready(None) => {
                    *this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
