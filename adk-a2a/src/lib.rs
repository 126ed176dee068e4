//! # adk-a2a
//!
//! Bridges ADK agent event streams and the Agent-to-Agent (A2A) protocol.
//!
//! ## Server side
//!
//! [`Executor`] runs an [`Agent`](adk_core::Agent) for one A2A task and writes
//! status and artifact updates to an [`EventQueue`]:
//!
//! ```rust,ignore
//! let executor = Executor::new(ExecutorConfig::new("app", agent, sessions));
//! let (queue, mut rx) = ChannelQueue::channel(64);
//! executor.execute(RequestContext::for_message(message), &queue).await?;
//! ```
//!
//! Partial agent events are streamed as artifact chunks; how chunks map onto
//! artifacts is chosen with [`OutputMode`].
//!
//! ## Client side
//!
//! [`RemoteA2aAgent`] sends the user content to a remote agent through an
//! [`A2aTransport`] and feeds the returned events through a [`RunProcessor`],
//! which re-assembles chunked artifacts into complete events.

pub mod aggregator;
pub mod artifact;
pub mod callbacks;
pub mod events;
pub mod executor;
pub mod metadata;
pub mod parts;
pub mod queue;
pub mod remote_agent;
pub mod types;

pub use aggregator::RunProcessor;
pub use artifact::{ArtifactMaker, OutputMode};
pub use callbacks::{
    AfterEventCallback, AfterExecuteCallback, BeforeExecuteCallback, EventLog, ExecutorContext,
    RequestContext,
};
pub use events::{event_to_message, message_to_content, to_session_event};
pub use executor::{Executor, ExecutorConfig};
pub use metadata::{InvocationMeta, to_invocation_meta};
pub use parts::{
    A2aPartConverter, AdkPartConverter, a2a_parts_to_adk, adk_parts_to_a2a,
    default_a2a_part_converter, default_adk_part_converter,
};
pub use queue::{ChannelQueue, EventQueue, VecQueue};
pub use remote_agent::{
    A2aTransport, LocalTransport, RemoteA2aAgent, RemoteA2aAgentBuilder, RemoteA2aConfig,
    UpdateEventStream,
};
pub use types::*;
