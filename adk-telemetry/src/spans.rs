//! Span helpers for A2A bridge operations

use tracing::Span;

/// Create a span covering one task execution
///
/// # Example
/// ```
/// use adk_telemetry::a2a_execute_span;
/// let span = a2a_execute_span("task-1", "ctx-1");
/// let _enter = span.enter();
/// ```
pub fn a2a_execute_span(task_id: &str, context_id: &str) -> Span {
    tracing::info_span!(
        "a2a.execute",
        task.id = task_id,
        context.id = context_id,
        session.id = tracing::field::Empty,
        otel.kind = "server"
    )
}

/// Create a span for a task cancellation request
pub fn a2a_cancel_span(task_id: &str, context_id: &str) -> Span {
    tracing::info_span!(
        "a2a.cancel",
        task.id = task_id,
        context.id = context_id,
        otel.kind = "server"
    )
}

/// Create a span for one request to a remote agent
pub fn remote_agent_span(agent_name: &str, invocation_id: &str) -> Span {
    tracing::info_span!(
        "a2a.remote_agent",
        agent.name = agent_name,
        invocation.id = invocation_id,
        otel.kind = "client"
    )
}

/// Create a span for callback execution
///
/// # Arguments
/// * `callback_type` - Type of callback (e.g., "before_execute", "after_event")
pub fn callback_span(callback_type: &str) -> Span {
    tracing::debug_span!("callback", callback.type = callback_type)
}

/// Record the bound session on the current span
pub fn record_session(session_id: &str) {
    Span::current().record("session.id", session_id);
}
