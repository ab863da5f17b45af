//! Streaming adapter
//!
//! Turns one orchestrated turn into the wire protocol: a `metadata` event,
//! the answer in paced 20-character `chunk` events, then `complete`. A
//! failed turn produces a single `error` event instead. The answer is
//! generated in full before the first event goes out; only delivery is
//! incremental.

use futures::stream::{self, Stream, StreamExt};
use sdk::types::{TurnRequest, TurnResponse, WireEvent};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use super::orchestrator::Orchestrator;

/// Characters per chunk event.
pub const CHUNK_CHARS: usize = 20;

/// Pause between consecutive chunk emissions.
pub const CHUNK_DELAY: Duration = Duration::from_millis(50);

/// A finite stream of wire events.
pub type EventStream = Pin<Box<dyn Stream<Item = WireEvent> + Send>>;

/// Split `text` into pieces of at most `CHUNK_CHARS` characters.
///
/// Splits on `char` boundaries, so a multi-byte character is never cut.
pub fn chunk_text(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// The full event sequence for a finished turn.
pub fn events_for(response: &TurnResponse) -> Vec<WireEvent> {
    if let Some(error) = &response.error {
        return vec![WireEvent::Error {
            error: error.clone(),
            conversation_id: response.conversation_id.clone(),
        }];
    }

    let chunks = chunk_text(&response.response_text);
    let total_chunks = chunks.len();

    let mut events = Vec::with_capacity(total_chunks + 2);
    events.push(WireEvent::Metadata {
        conversation_id: response.conversation_id.clone(),
        sources: response.sources.clone(),
        memory_used: response.memory_used_count,
        web_results: response.web_result_count,
        processing_time: response.processing_time_seconds,
    });
    events.extend(
        chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_id, content)| WireEvent::Chunk { content, chunk_id }),
    );
    events.push(WireEvent::Complete {
        conversation_id: response.conversation_id.clone(),
        total_chunks,
    });
    events
}

/// Whether delivery pauses before `event`: before every chunk but the
/// first, and before `complete` when any chunk was sent.
fn paced(event: &WireEvent) -> bool {
    match event {
        WireEvent::Chunk { chunk_id, .. } => *chunk_id > 0,
        WireEvent::Complete { total_chunks, .. } => *total_chunks > 0,
        _ => false,
    }
}

#[derive(Clone)]
pub struct StreamingAdapter {
    orchestrator: Arc<Orchestrator>,
    chunk_delay: Duration,
}

impl StreamingAdapter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            chunk_delay: CHUNK_DELAY,
        }
    }

    /// Override the pause between chunks.
    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Stream one turn as wire events.
    ///
    /// Nothing runs until the stream is first polled. The stream always ends
    /// with `complete` or `error`; dropping it early simply stops delivery.
    pub fn stream_turn(&self, request: TurnRequest) -> EventStream {
        let orchestrator = Arc::clone(&self.orchestrator);
        let delay = self.chunk_delay;

        let events = stream::once(async move {
            let response = orchestrator.process_turn(&request).await;
            stream::iter(events_for(&response))
        })
        .flatten()
        .then(move |event| async move {
            if paced(&event) && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        });

        Box::pin(events)
    }

    /// Stream one turn as Server-Sent Events frames.
    pub fn stream_sse(&self, request: TurnRequest) -> Pin<Box<dyn Stream<Item = String> + Send>> {
        Box::pin(self.stream_turn(request).map(|event| event.to_sse_frame()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::errors::TurnError;
    use sdk::types::Metadata;

    fn success(text: &str) -> TurnResponse {
        TurnResponse {
            response_text: text.to_string(),
            sources: vec!["memory".into()],
            memory_used_count: 1,
            web_result_count: 0,
            facts_retrieved_count: 0,
            processing_time_seconds: 0.12,
            metadata: Metadata::new(),
            conversation_id: Some("c-1".into()),
            error: None,
        }
    }

    #[test]
    fn test_chunk_text_boundaries() {
        assert!(chunk_text("").is_empty());
        assert_eq!(chunk_text("Hi there!"), vec!["Hi there!"]);

        let forty_one = "a".repeat(41);
        let chunks = chunk_text(&forty_one);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "a");
    }

    #[test]
    fn test_chunk_text_counts_chars_not_bytes() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 20);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_events_for_success() {
        let events = events_for(&success("Hello"));
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], WireEvent::Metadata { memory_used: 1, .. }));
        assert_eq!(
            events[1],
            WireEvent::Chunk {
                content: "Hello".into(),
                chunk_id: 0
            }
        );
        assert_eq!(
            events[2],
            WireEvent::Complete {
                conversation_id: Some("c-1".into()),
                total_chunks: 1
            }
        );
    }

    #[test]
    fn test_events_for_empty_text() {
        let events = events_for(&success(""));
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1],
            WireEvent::Complete { total_chunks: 0, .. }
        ));
    }

    #[test]
    fn test_events_for_failure() {
        let failed = TurnResponse::failure(
            &TurnError::InvalidInput("user message is empty".into()),
            Some("c-2".into()),
            0.0,
        );
        let events = events_for(&failed);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], WireEvent::Error { error, .. } if error.starts_with("RAG processing failed")));
    }

    #[test]
    fn test_pacing_rule() {
        assert!(!paced(&WireEvent::Chunk {
            content: "a".into(),
            chunk_id: 0
        }));
        assert!(paced(&WireEvent::Chunk {
            content: "a".into(),
            chunk_id: 1
        }));
        assert!(!paced(&WireEvent::Complete {
            conversation_id: None,
            total_chunks: 0
        }));
    }
}
