//! # adk-core
//!
//! Core traits and types shared by the ADK A2A bridge.
//!
//! ## Overview
//!
//! - [`Event`] - One item of an agent's output stream, possibly partial
//! - [`Content`] / [`Part`] - Ordered content carried by an event
//! - [`LlmResponse`] - Content plus usage, grounding and citation metadata
//! - [`Agent`] / [`InvocationContext`] - The agent seam the bridge drives
//! - [`AdkError`] / [`Result`] - Unified error handling
//!
//! ## Agents
//!
//! ```rust,ignore
//! #[async_trait]
//! pub trait Agent: Send + Sync {
//!     fn name(&self) -> &str;
//!     fn description(&self) -> &str;
//!     async fn run(&self, ctx: Arc<dyn InvocationContext>) -> Result<EventStream>;
//! }
//! ```
//!
//! An [`EventStream`] is pulled one item at a time. Consumers stop early by
//! dropping it; producers should also watch
//! [`InvocationContext::cancellation_token`] and end their stream once it fires.

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod model;
pub mod types;

pub use agent::{Agent, EventStream};
pub use context::{InvocationContext, RunConfig, StreamingMode};
pub use error::{AdkError, Result};
pub use event::{Event, EventActions};
pub use model::{
    CitationMetadata, CitationSource, GroundingChunk, GroundingMetadata, LlmResponse, UsageMetadata,
};
pub use types::{Content, FunctionResponseData, Part};

pub use tokio_util::sync::CancellationToken;
