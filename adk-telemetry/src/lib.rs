//! # ADK Telemetry
//!
//! Structured logging for the A2A bridge, built on `tracing`.
//!
//! ## Usage
//!
//! ```rust
//! use adk_telemetry::{init_telemetry, info, a2a_execute_span};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("my-a2a-service")?;
//!
//!     let span = a2a_execute_span("task-1", "ctx-1");
//!     let _enter = span.enter();
//!     info!("executing");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Instrument, Span, debug, error, info, instrument, trace, warn};

pub use init::{init_json_telemetry, init_telemetry};
pub use spans::*;
