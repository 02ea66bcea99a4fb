use super::*;
use crate::envelope::PromptFrame;
use std::sync::Mutex;
use tokio::sync::mpsc;
use wayfarer_llm::PendingConfirmation;

#[derive(Default)]
struct CollectingSink {
    envelopes: Mutex<Vec<ResponseEnvelope>>,
}

#[async_trait::async_trait]
impl EnvelopeSink for CollectingSink {
    async fn emit(&self, envelope: ResponseEnvelope) {
        self.envelopes.lock().unwrap().push(envelope);
    }
}

fn context() -> PipelineContext {
    let request = PromptFrame::parse(r#"{"type":"prompt","requestId":"r-1","message":"hotels"}"#)
        .unwrap()
        .into_request();
    PipelineContext::new(request, "alice", "sub-1")
}

fn stream_of(items: Vec<wayfarer_llm::Result<StreamEvent>>) -> ChatStream {
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        tx.try_send(item).unwrap();
    }
    rx
}

#[test]
fn test_aggregator_skips_empty_deltas() {
    let mut aggregator = Aggregator::new();
    assert_eq!(aggregator.push("Hel"), Some("Hel"));
    assert_eq!(aggregator.push(""), None);
    assert_eq!(aggregator.push("lo"), Some("Hello"));
    assert_eq!(aggregator.chunks(), 2);
}

#[test]
fn test_completion_text_overrides_buffer() {
    let mut aggregator = Aggregator::new();
    aggregator.push("draft");
    let reply = aggregator.finish(Completion::text("final answer"));
    assert_eq!(reply.text, "final answer");

    let mut aggregator = Aggregator::new();
    aggregator.push("streamed");
    let reply = aggregator.finish(Completion {
        text: Some("  ".to_string()),
        suggestions: vec!["Book it".to_string()],
        ..Default::default()
    });
    assert_eq!(reply.text, "streamed");
    assert_eq!(reply.suggestions, vec!["Book it"]);
}

#[tokio::test]
async fn test_drain_emits_accumulated_updates() {
    let sink = CollectingSink::default();
    let confirmation = PendingConfirmation {
        operation: "booking".to_string(),
        summary: "Hotel Lotte, 2 nights".to_string(),
        payload: serde_json::json!({"hotelId": 42}),
    };
    let stream = stream_of(vec![
        Ok(StreamEvent::Delta("Found ".to_string())),
        Ok(StreamEvent::Delta(String::new())),
        Ok(StreamEvent::Delta("2 hotels".to_string())),
        Ok(StreamEvent::Completed(Completion {
            confirmation: Some(confirmation.clone()),
            ..Default::default()
        })),
    ]);

    let reply = drain(stream, &sink, &context()).await.unwrap();
    assert_eq!(reply.text, "Found 2 hotels");
    assert_eq!(reply.confirmation, Some(confirmation));

    let envelopes = sink.envelopes.lock().unwrap();
    let texts: Vec<_> = envelopes
        .iter()
        .map(|e| {
            assert_eq!(e.kind, EnvelopeKind::StreamUpdate);
            assert_eq!(e.request_id.as_deref(), Some("r-1"));
            e.ai_response.clone().unwrap()
        })
        .collect();
    assert_eq!(texts, vec!["Found ", "Found 2 hotels"]);
}

#[tokio::test]
async fn test_drain_error_item_is_upstream_failure() {
    let sink = CollectingSink::default();
    let stream = stream_of(vec![
        Ok(StreamEvent::Delta("partial".to_string())),
        Err(wayfarer_llm::Error::Network("connection reset".to_string())),
    ]);

    let err = drain(stream, &sink, &context()).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
}

#[tokio::test]
async fn test_drain_truncated_stream_is_upstream_failure() {
    let sink = CollectingSink::default();
    let stream = stream_of(vec![Ok(StreamEvent::Delta("partial".to_string()))]);

    let err = drain(stream, &sink, &context()).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("without completion")));
    assert_eq!(sink.envelopes.lock().unwrap().len(), 1);
}
