//! Blocking entry points
//!
//! Synchronous callers (the CLI, worker threads, other non-async code) get
//! the same pipeline as async callers. Each call builds a private
//! current-thread runtime, drives the one shared future to completion, and
//! drops the runtime when the call returns or unwinds. A caller that is
//! already inside a tokio runtime gets its private runtime on a scoped
//! helper thread, since a runtime cannot be blocked on from within another.

use futures::StreamExt;
use sdk::errors::TurnError;
use sdk::types::{TurnRequest, TurnResponse, WireEvent};
use std::future::Future;
use std::time::Instant;
use tokio::runtime::{Builder, Handle, Runtime};

use super::orchestrator::{panic_message, round_seconds, Orchestrator};
use super::stream::{EventStream, StreamingAdapter};

fn build_runtime() -> Result<Runtime, TurnError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TurnError::Scheduler(e.to_string()))
}

fn block_on_fresh<F: Future>(future: F) -> Result<F::Output, TurnError> {
    let runtime = build_runtime()?;
    Ok(runtime.block_on(future))
}

/// Drive `future` to completion on a runtime owned by this call alone.
pub fn block_on_isolated<F>(future: F) -> Result<F::Output, TurnError>
where
    F: Future + Send,
    F::Output: Send,
{
    if Handle::try_current().is_ok() {
        std::thread::scope(|scope| {
            scope
                .spawn(|| block_on_fresh(future))
                .join()
                .unwrap_or_else(|payload| Err(TurnError::Panicked(panic_message(payload.as_ref()))))
        })
    } else {
        block_on_fresh(future)
    }
}

impl Orchestrator {
    /// Blocking twin of [`Orchestrator::process_turn`].
    ///
    /// Produces the same `TurnResponse` the async entry point would for the
    /// same request and port behavior. A runtime that cannot be built turns
    /// into a failed response rather than a panic.
    pub fn process_turn_blocking(&self, request: &TurnRequest) -> TurnResponse {
        let started = Instant::now();
        match block_on_isolated(self.process_turn(request)) {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("Blocking turn could not run: {}", err);
                TurnResponse::failure(
                    &err,
                    request.conversation_id.clone(),
                    round_seconds(started.elapsed().as_secs_f64()),
                )
            }
        }
    }
}

/// Iterator over a streamed turn for synchronous callers.
///
/// Outside a runtime, events are produced lazily and the private runtime
/// lives exactly as long as the iterator. Inside a runtime, the whole
/// stream is drained on a helper thread first.
pub enum BlockingEvents {
    Live {
        runtime: Runtime,
        stream: EventStream,
    },
    Buffered(std::vec::IntoIter<WireEvent>),
}

impl Iterator for BlockingEvents {
    type Item = WireEvent;

    fn next(&mut self) -> Option<WireEvent> {
        match self {
            BlockingEvents::Live { runtime, stream } => runtime.block_on(stream.next()),
            BlockingEvents::Buffered(events) => events.next(),
        }
    }
}

impl StreamingAdapter {
    /// Blocking twin of [`StreamingAdapter::stream_turn`].
    pub fn stream_turn_blocking(&self, request: TurnRequest) -> BlockingEvents {
        let conversation_id = request.conversation_id.clone();
        let scheduler_failure = |err: TurnError| {
            tracing::error!("Blocking stream could not run: {}", err);
            BlockingEvents::Buffered(
                vec![WireEvent::Error {
                    error: format!("RAG processing failed: {}", err),
                    conversation_id: conversation_id.clone(),
                }]
                .into_iter(),
            )
        };

        let stream = self.stream_turn(request);

        if Handle::try_current().is_ok() {
            match block_on_isolated(stream.collect::<Vec<_>>()) {
                Ok(events) => BlockingEvents::Buffered(events.into_iter()),
                Err(err) => scheduler_failure(err),
            }
        } else {
            match build_runtime() {
                Ok(runtime) => BlockingEvents::Live { runtime, stream },
                Err(err) => scheduler_failure(err),
            }
        }
    }
}
