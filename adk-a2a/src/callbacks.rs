//! Executor extension points.
//!
//! Each hook is a single optional slot on [`ExecutorConfig`](crate::ExecutorConfig).
//!
//! ```rust,ignore
//! let config = ExecutorConfig::new("app", agent, sessions).with_before_execute(Box::new(
//!     |mut req| {
//!         Box::pin(async move {
//!             req.metadata.insert("trace_id".into(), "abc".into());
//!             Ok(req)
//!         })
//!     },
//! ));
//! ```

use crate::types::{Message, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};
use adk_core::{Event, Result};
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// One inbound request: the message plus the task it targets.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub task_id: String,
    pub context_id: String,
    pub message: Message,
    /// Present when the task already exists on the server.
    pub stored_task: Option<Task>,
    /// Carried onto the metadata of every event emitted for this request.
    pub metadata: Map<String, Value>,
}

impl RequestContext {
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, message: Message) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            message,
            stored_task: None,
            metadata: Map::new(),
        }
    }

    /// Request for a fresh task with generated ids, honoring ids already set on the message.
    pub fn for_message(message: Message) -> Self {
        let task_id =
            message.task_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let context_id =
            message.context_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self::new(task_id, context_id, message)
    }

    pub fn with_stored_task(mut self, task: Task) -> Self {
        self.stored_task = Some(task);
        self
    }
}

/// Non-partial agent events of one execution. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<RwLock<Vec<Event>>>);

impl EventLog {
    pub(crate) fn push(&self, event: Event) {
        self.0.write().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Event>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the after-event and after-execute hooks can observe.
#[derive(Debug, Clone)]
pub struct ExecutorContext {
    request: RequestContext,
    user_id: String,
    session_id: String,
    events: EventLog,
    run_error: Option<String>,
}

impl ExecutorContext {
    pub(crate) fn new(
        request: RequestContext,
        user_id: String,
        session_id: String,
        events: EventLog,
        run_error: Option<String>,
    ) -> Self {
        Self { request, user_id, session_id, events, run_error }
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn task_id(&self) -> &str {
        &self.request.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.request.context_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Non-partial agent events produced so far in this execution. The view
    /// is live: events logged after the hook returns show up here too.
    /// Do not hold the guard across an `.await`.
    pub fn events(&self) -> RwLockReadGuard<'_, Vec<Event>> {
        self.events.read()
    }

    /// Set once the agent stream, session binding or a hook has failed.
    pub fn run_error(&self) -> Option<&str> {
        self.run_error.as_deref()
    }
}

pub type BeforeExecuteCallback = Box<
    dyn Fn(RequestContext) -> Pin<Box<dyn Future<Output = Result<RequestContext>> + Send>>
        + Send
        + Sync,
>;

pub type AfterEventCallback = Box<
    dyn Fn(
            Arc<ExecutorContext>,
            Event,
            TaskArtifactUpdateEvent,
        ) -> Pin<Box<dyn Future<Output = Result<TaskArtifactUpdateEvent>> + Send>>
        + Send
        + Sync,
>;

pub type AfterExecuteCallback = Box<
    dyn Fn(
            Arc<ExecutorContext>,
            TaskStatusUpdateEvent,
        ) -> Pin<Box<dyn Future<Output = Result<TaskStatusUpdateEvent>> + Send>>
        + Send
        + Sync,
>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, TaskState, TaskStatus};

    #[test]
    fn test_for_message_uses_message_ids() {
        let msg = Message::builder().role(Role::User).task_id("t1").context_id("c1").build();
        let req = RequestContext::for_message(msg);
        assert_eq!(req.task_id, "t1");
        assert_eq!(req.context_id, "c1");

        let generated = RequestContext::for_message(Message::builder().build());
        assert!(!generated.task_id.is_empty());
        assert_ne!(generated.task_id, generated.context_id);
    }

    #[test]
    fn test_with_stored_task() {
        let task = Task {
            id: "t1".into(),
            context_id: "c1".into(),
            status: TaskStatus::new(TaskState::Working, None),
            artifacts: vec![],
            history: vec![],
            metadata: None,
        };
        let req = RequestContext::new("t1", "c1", Message::builder().build()).with_stored_task(task);
        assert!(req.stored_task.is_some());
    }

    #[tokio::test]
    async fn test_before_execute_callback_shape() {
        let callback: BeforeExecuteCallback = Box::new(|mut req| {
            Box::pin(async move {
                req.metadata.insert("trace_id".into(), Value::String("abc".into()));
                Ok(req)
            })
        });
        let req = callback(RequestContext::new("t", "c", Message::builder().build())).await.unwrap();
        assert_eq!(req.metadata["trace_id"], "abc");
    }

    #[test]
    fn test_event_log_clones_share_entries() {
        let log = EventLog::default();
        let ctx = ExecutorContext::new(
            RequestContext::new("t", "c", Message::builder().build()),
            "user".into(),
            "c".into(),
            log.clone(),
            None,
        );
        assert!(ctx.events().is_empty());

        log.push(Event::new("inv"));
        log.push(Event::new("inv"));
        assert_eq!(log.len(), 2);
        assert_eq!(ctx.events().len(), 2);
    }
}
