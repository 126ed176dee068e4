//! # adk-session
//!
//! The session store the A2A bridge binds protocol contexts to.
//!
//! [`SessionService`] is the narrow interface the executor depends on;
//! [`InMemorySessionService`] is a process-local implementation suitable for
//! tests and single-node deployments. Durable backends implement the same
//! trait out of tree.

pub mod inmemory;
pub mod service;
pub mod session;

pub use adk_core::{Event, EventActions};
pub use inmemory::InMemorySessionService;
pub use service::{
    AppendEventRequest, CreateRequest, DeleteRequest, GetRequest, ListRequest, SessionService,
};
pub use session::Session;
