use crate::aggregator::RunProcessor;
use crate::callbacks::RequestContext;
use crate::events::event_to_message;
use crate::executor::Executor;
use crate::parts::{
    A2aPartConverter, AdkPartConverter, default_a2a_part_converter, default_adk_part_converter,
};
use crate::queue::ChannelQueue;
use crate::types::{Message, Role, UpdateEvent};
use adk_core::{AdkError, Agent, Event, EventStream, InvocationContext, Result};
use adk_telemetry::{Instrument, debug, remote_agent_span, warn};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Error code on the event reporting that the remote agent was unreachable.
pub const TRANSPORT_ERROR_CODE: &str = "a2a_transport_error";

pub type UpdateEventStream = Pin<Box<dyn Stream<Item = Result<UpdateEvent>> + Send>>;

/// Delivers one message to a remote agent and streams back its task events.
#[async_trait]
pub trait A2aTransport: Send + Sync {
    async fn send_streaming_message(&self, message: Message) -> Result<UpdateEventStream>;
}

/// Runs an [`Executor`] in-process, as if it were reached over the network.
pub struct LocalTransport {
    executor: Arc<Executor>,
    capacity: usize,
}

impl LocalTransport {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor, capacity: 64 }
    }

    /// Events buffered between the executor and the consumer.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}

#[async_trait]
impl A2aTransport for LocalTransport {
    async fn send_streaming_message(&self, message: Message) -> Result<UpdateEventStream> {
        let req = RequestContext::for_message(message);
        let (queue, rx) = ChannelQueue::channel(self.capacity);
        let executor = self.executor.clone();
        let handle = tokio::spawn(async move { executor.execute(req, &queue).await });

        let stream = async_stream::stream! {
            let mut events = ReceiverStream::new(rx);
            while let Some(event) = events.next().await {
                yield Ok(event);
            }
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    yield Err(e);
                }
                Err(e) => {
                    yield Err(AdkError::Transport(format!("executor task failed: {e}")));
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[derive(Clone)]
pub struct RemoteA2aConfig {
    pub name: String,
    pub description: String,
    pub transport: Arc<dyn A2aTransport>,
    pub adk_part_converter: AdkPartConverter,
    pub a2a_part_converter: A2aPartConverter,
}

/// An agent whose work is done by a remote A2A agent.
///
/// The user content of each invocation is sent as one message on the context
/// named after the local session. Returned chunks are re-aggregated, so the
/// stream yields partial events followed by complete non-partial ones.
pub struct RemoteA2aAgent {
    config: RemoteA2aConfig,
}

impl RemoteA2aAgent {
    pub fn new(config: RemoteA2aConfig) -> Self {
        Self { config }
    }

    pub fn builder(name: impl Into<String>) -> RemoteA2aAgentBuilder {
        RemoteA2aAgentBuilder::new(name)
    }
}

#[async_trait]
impl Agent for RemoteA2aAgent {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream> {
        let invocation_id = ctx.invocation_id().to_string();
        let agent_name = self.config.name.clone();
        let transport = self.config.transport.clone();
        let converter = self.config.a2a_part_converter.clone();
        let token = ctx.cancellation_token().clone();
        let span = remote_agent_span(&agent_name, &invocation_id);

        let message = build_message(ctx.as_ref(), &self.config.adk_part_converter)?;

        let stream = async_stream::stream! {
            let sent = transport.send_streaming_message(message).instrument(span.clone()).await;
            let mut updates = match sent {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(parent: &span, error = %e, "remote agent unreachable");
                    yield Ok(transport_error_event(&invocation_id, &agent_name, &e));
                    return;
                }
            };

            let mut processor = RunProcessor::new(&invocation_id, &agent_name, converter);
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(AdkError::Cancelled),
                    next = updates.next() => Ok(next),
                };
                let update = match next {
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        warn!(parent: &span, error = %e, "remote event stream failed");
                        yield Ok(transport_error_event(&invocation_id, &agent_name, &e));
                        return;
                    }
                    Ok(Some(Ok(update))) => update,
                };

                debug!(parent: &span, task_id = ?update.task_id(), final_update = update.is_final(), "received update");
                match processor.process(&update) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

pub struct RemoteA2aAgentBuilder {
    name: String,
    description: String,
    transport: Option<Arc<dyn A2aTransport>>,
    adk_part_converter: AdkPartConverter,
    a2a_part_converter: A2aPartConverter,
}

impl RemoteA2aAgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            transport: None,
            adk_part_converter: default_adk_part_converter(),
            a2a_part_converter: default_a2a_part_converter(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn A2aTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn adk_part_converter(mut self, converter: AdkPartConverter) -> Self {
        self.adk_part_converter = converter;
        self
    }

    pub fn a2a_part_converter(mut self, converter: A2aPartConverter) -> Self {
        self.a2a_part_converter = converter;
        self
    }

    pub fn build(self) -> Result<RemoteA2aAgent> {
        let transport = self
            .transport
            .ok_or_else(|| AdkError::Config("RemoteA2aAgent requires a transport".to_string()))?;

        Ok(RemoteA2aAgent::new(RemoteA2aConfig {
            name: self.name,
            description: self.description,
            transport,
            adk_part_converter: self.adk_part_converter,
            a2a_part_converter: self.a2a_part_converter,
        }))
    }
}

fn build_message(ctx: &dyn InvocationContext, converter: &AdkPartConverter) -> Result<Message> {
    let mut event = Event::new(ctx.invocation_id()).with_author("user");
    event.set_content(ctx.user_content().clone());

    let mut message = event_to_message(&event, converter)?;
    message.role = Role::User;
    message.message_id = uuid::Uuid::new_v4().to_string();
    message.context_id = Some(ctx.session_id().to_string());
    Ok(message)
}

fn transport_error_event(invocation_id: &str, agent_name: &str, error: &AdkError) -> Event {
    let mut event = Event::new(invocation_id).with_author(agent_name);
    event.llm_response.error_code = Some(TRANSPORT_ERROR_CODE.to_string());
    event.llm_response.error_message = Some(error.to_string());
    event.llm_response.turn_complete = true;
    event
}
