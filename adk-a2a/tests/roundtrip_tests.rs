//! End-to-end tests: an executor's output fed back through the client side.

use adk_a2a::{
    A2aTransport, Executor, ExecutorConfig, LocalTransport, Message, OutputMode, RemoteA2aAgent,
    RunProcessor, TaskState, TaskStatusUpdateEvent, UpdateEvent, UpdateEventStream,
    adk_parts_to_a2a, default_a2a_part_converter, default_adk_part_converter,
};
use adk_core::{
    AdkError, Agent, CancellationToken, Content, Event, EventStream, InvocationContext,
    LlmResponse, Result, RunConfig,
};
use adk_session::InMemorySessionService;
use async_trait::async_trait;
use futures::StreamExt;
use proptest::prelude::*;
use serde_json::Map;
use std::sync::Arc;

/// Streams the user's text back in two partial halves, then whole.
struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "echoes the user"
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let text = ctx.user_content().text();
        let (head, tail) = text.split_at(text.len() / 2);
        let events = vec![
            Ok(text_event(ctx.invocation_id(), "echo", head, true)),
            Ok(text_event(ctx.invocation_id(), "echo", tail, true)),
            Ok(text_event(ctx.invocation_id(), "echo", &text, false)),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Streams two chunks and then fails.
struct FlakyAgent;

#[async_trait]
impl Agent for FlakyAgent {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "fails mid-stream"
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let invocation_id = ctx.invocation_id().to_string();
        let stream = async_stream::stream! {
            yield Ok(text_event(&invocation_id, "flaky", "Hel", true));
            yield Ok(text_event(&invocation_id, "flaky", "lo", true));
            yield Err(AdkError::Agent("model exploded".to_string()));
        };
        Ok(Box::pin(stream))
    }
}

struct Unreachable;

#[async_trait]
impl A2aTransport for Unreachable {
    async fn send_streaming_message(&self, _message: Message) -> Result<UpdateEventStream> {
        Err(AdkError::Transport("connection refused".to_string()))
    }
}

struct TestContext {
    content: Content,
    run_config: RunConfig,
    token: CancellationToken,
}

impl TestContext {
    fn new(text: &str) -> Self {
        Self {
            content: Content::new("user").with_text(text),
            run_config: RunConfig::default(),
            token: CancellationToken::new(),
        }
    }
}

impl InvocationContext for TestContext {
    fn invocation_id(&self) -> &str {
        "inv-client"
    }
    fn agent_name(&self) -> &str {
        "remote"
    }
    fn user_id(&self) -> &str {
        "user-1"
    }
    fn app_name(&self) -> &str {
        "client-app"
    }
    fn session_id(&self) -> &str {
        "client-session"
    }
    fn user_content(&self) -> &Content {
        &self.content
    }
    fn run_config(&self) -> &RunConfig {
        &self.run_config
    }
    fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

fn text_event(invocation_id: &str, author: &str, text: &str, partial: bool) -> Event {
    let mut event = Event::new(invocation_id).with_author(author);
    let content = Content::new("model").with_text(text);
    event.llm_response =
        if partial { LlmResponse::partial(content) } else { LlmResponse::new(content) };
    event
}

fn remote_over(agent: Arc<dyn Agent>, mode: OutputMode) -> RemoteA2aAgent {
    let executor = Executor::new(
        ExecutorConfig::new("server", agent, Arc::new(InMemorySessionService::new()))
            .with_output_mode(mode),
    );
    RemoteA2aAgent::builder("remote")
        .description("echo over A2A")
        .transport(Arc::new(LocalTransport::new(Arc::new(executor))))
        .build()
        .unwrap()
}

async fn run_remote(agent: &RemoteA2aAgent, ctx: TestContext) -> Vec<Result<Event>> {
    let stream = agent.run(Arc::new(ctx)).await.unwrap();
    stream.collect().await
}

fn complete_texts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter(|e| !e.is_partial())
        .filter_map(|e| e.content().map(|c| c.text()))
        .collect()
}

#[tokio::test]
async fn test_remote_round_trip() {
    let agent = remote_over(Arc::new(EchoAgent), OutputMode::ArtifactPerAuthor);
    let events: Vec<Event> =
        run_remote(&agent, TestContext::new("Hello")).await.into_iter().map(|e| e.unwrap()).collect();

    let partials: Vec<_> = events
        .iter()
        .filter(|e| e.is_partial())
        .map(|e| e.content().unwrap().text())
        .collect();
    assert_eq!(partials, vec!["He", "llo"]);
    assert_eq!(complete_texts(&events), vec!["Hello"]);
    assert!(events.iter().all(|e| e.author == "remote" && e.invocation_id == "inv-client"));
}

#[tokio::test]
async fn test_remote_round_trip_legacy() {
    let agent = remote_over(Arc::new(EchoAgent), OutputMode::Legacy);
    let events: Vec<Event> =
        run_remote(&agent, TestContext::new("Hello")).await.into_iter().map(|e| e.unwrap()).collect();

    assert_eq!(complete_texts(&events), vec!["Hello"]);
}

#[tokio::test]
async fn test_remote_failure_surfaces_error() {
    let agent = remote_over(Arc::new(FlakyAgent), OutputMode::ArtifactPerAuthor);
    let events: Vec<Event> =
        run_remote(&agent, TestContext::new("hi")).await.into_iter().map(|e| e.unwrap()).collect();

    // the unfinished stream is flushed before the failure is reported
    let (last, rest) = events.split_last().unwrap();
    assert_eq!(complete_texts(rest), vec!["Hello"]);
    let message = last.llm_response.error_message.as_deref().unwrap();
    assert!(message.starts_with("agent run failed:"));
    assert!(last.llm_response.turn_complete);
}

#[tokio::test]
async fn test_unreachable_transport() {
    let agent = RemoteA2aAgent::builder("remote").transport(Arc::new(Unreachable)).build().unwrap();
    let events = run_remote(&agent, TestContext::new("hi")).await;

    assert_eq!(events.len(), 1);
    let event = events.into_iter().next().unwrap().unwrap();
    assert_eq!(event.llm_response.error_code.as_deref(), Some("a2a_transport_error"));
}

#[tokio::test]
async fn test_cancelled_invocation_stops_stream() {
    let agent = remote_over(Arc::new(EchoAgent), OutputMode::ArtifactPerAuthor);
    let ctx = TestContext::new("Hello");
    ctx.token.cancel();

    let events = run_remote(&agent, ctx).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(AdkError::Cancelled)));
}

/// Push agent events through the artifact maker and a run processor, the way
/// they travel between executor and remote agent.
fn replay(events: &[Event]) -> Vec<Event> {
    let mut maker = OutputMode::ArtifactPerAuthor.artifact_maker("task", "ctx");
    let converter = default_adk_part_converter();
    let mut processor = RunProcessor::new("inv", "remote", default_a2a_part_converter());

    let mut out = Vec::new();
    for event in events {
        let parts = match event.content() {
            Some(content) => adk_parts_to_a2a(&converter, event, &content.parts).unwrap(),
            None => Vec::new(),
        };
        if let Some(update) = maker.transform(event, parts, Map::new()) {
            let update: UpdateEvent = update.into();
            out.extend(processor.process(&update).unwrap());
        }
    }
    let done: UpdateEvent =
        TaskStatusUpdateEvent::new("task", "ctx", TaskState::Completed, None).into_final().into();
    out.extend(processor.process(&done).unwrap());
    out
}

/// Partial chunks, then either the complete text or an empty closing event.
fn stream_for(author: &str, chunks: &[String], close_empty: bool) -> Vec<Event> {
    let mut events: Vec<Event> =
        chunks.iter().map(|chunk| text_event("inv", author, chunk, true)).collect();
    if close_empty {
        let mut close = Event::new("inv").with_author(author);
        close.llm_response.turn_complete = true;
        events.push(close);
    } else {
        events.push(text_event("inv", author, &chunks.concat(), false));
    }
    events
}

fn arb_chunks() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9 .,]{1,8}", 1..12)
}

proptest! {
    #[test]
    fn prop_aggregation_reconstructs_text(chunks in arb_chunks(), close_empty in any::<bool>()) {
        let out = replay(&stream_for("writer", &chunks, close_empty));

        prop_assert_eq!(complete_texts(&out), vec![chunks.concat()]);
        let partials: Vec<String> =
            out.iter().filter(|e| e.is_partial()).map(|e| e.content().unwrap().text()).collect();
        prop_assert_eq!(partials, chunks);
    }

    #[test]
    fn prop_interleaved_authors_stay_separate(
        a in arb_chunks(),
        b in arb_chunks(),
        close_a in any::<bool>(),
        close_b in any::<bool>()
    ) {
        let mut a_events = stream_for("a", &a, close_a);
        let mut b_events = stream_for("b", &b, close_b);
        let a_final = a_events.pop().unwrap();
        let b_final = b_events.pop().unwrap();

        let mut interleaved = Vec::new();
        let mut a_iter = a_events.into_iter();
        let mut b_iter = b_events.into_iter();
        loop {
            let next_a = a_iter.next();
            let next_b = b_iter.next();
            if next_a.is_none() && next_b.is_none() {
                break;
            }
            interleaved.extend(next_a);
            interleaved.extend(next_b);
        }
        interleaved.push(a_final);
        interleaved.push(b_final);

        let out = replay(&interleaved);
        prop_assert_eq!(complete_texts(&out), vec![a.concat(), b.concat()]);
    }
}
