use crate::artifact::{ArtifactMaker, OutputMode};
use crate::callbacks::{
    AfterEventCallback, AfterExecuteCallback, BeforeExecuteCallback, EventLog, ExecutorContext,
    RequestContext,
};
use crate::events::{event_to_message, message_to_content};
use crate::metadata::{InvocationMeta, to_event_meta, to_invocation_meta};
use crate::parts::{
    A2aPartConverter, AdkPartConverter, adk_parts_to_a2a, default_a2a_part_converter,
    default_adk_part_converter,
};
use crate::queue::EventQueue;
use crate::types::{Message, Part as A2aPart, Role, TaskState, TaskStatusUpdateEvent};
use adk_core::{
    Agent, CancellationToken, Content, Event, InvocationContext, Part, Result, RunConfig,
    StreamingMode,
};
use adk_session::{AppendEventRequest, CreateRequest, GetRequest, SessionService};
use adk_telemetry::{
    Instrument, a2a_cancel_span, a2a_execute_span, callback_span, debug, info, record_session,
    warn,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub struct ExecutorConfig {
    pub app_name: String,
    pub agent: Arc<dyn Agent>,
    pub session_service: Arc<dyn SessionService>,
    pub run_config: RunConfig,
    pub output_mode: OutputMode,
    pub adk_part_converter: AdkPartConverter,
    pub a2a_part_converter: A2aPartConverter,
    pub before_execute: Option<BeforeExecuteCallback>,
    pub after_event: Option<AfterEventCallback>,
    pub after_execute: Option<AfterExecuteCallback>,
}

impl ExecutorConfig {
    pub fn new(
        app_name: impl Into<String>,
        agent: Arc<dyn Agent>,
        session_service: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            agent,
            session_service,
            run_config: RunConfig::default(),
            output_mode: OutputMode::default(),
            adk_part_converter: default_adk_part_converter(),
            a2a_part_converter: default_a2a_part_converter(),
            before_execute: None,
            after_event: None,
            after_execute: None,
        }
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_run_config(mut self, run_config: RunConfig) -> Self {
        self.run_config = run_config;
        self
    }

    pub fn with_adk_part_converter(mut self, converter: AdkPartConverter) -> Self {
        self.adk_part_converter = converter;
        self
    }

    pub fn with_a2a_part_converter(mut self, converter: A2aPartConverter) -> Self {
        self.a2a_part_converter = converter;
        self
    }

    pub fn with_before_execute(mut self, callback: BeforeExecuteCallback) -> Self {
        self.before_execute = Some(callback);
        self
    }

    pub fn with_after_event(mut self, callback: AfterEventCallback) -> Self {
        self.after_event = Some(callback);
        self
    }

    pub fn with_after_execute(mut self, callback: AfterExecuteCallback) -> Self {
        self.after_execute = Some(callback);
        self
    }
}

type ActiveTasks = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Drives agent runs for A2A tasks.
///
/// One `execute` call serves one task turn: it binds the task's context to a
/// session, runs the agent and writes the resulting protocol events to the
/// caller's queue, ending with exactly one final status update. `cancel`
/// stops an in-flight execution and owns the `Canceled` update for it.
pub struct Executor {
    config: ExecutorConfig,
    active: ActiveTasks,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config, active: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Whether an execution for `task_id` is currently running.
    pub fn is_running(&self, task_id: &str) -> bool {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).contains_key(task_id)
    }

    /// Returns an error only for failures nothing can be reported for: a
    /// before-execute veto, an undecodable inbound message, a failed queue
    /// write, or an after-execute hook error.
    pub async fn execute(&self, req: RequestContext, queue: &dyn EventQueue) -> Result<()> {
        let span = a2a_execute_span(&req.task_id, &req.context_id);
        self.run_execution(req, queue).instrument(span).await
    }

    async fn run_execution(&self, req: RequestContext, queue: &dyn EventQueue) -> Result<()> {
        // registered first: a cancel arriving during setup must still stop this run
        let token = CancellationToken::new();
        let _registration = ActiveTask::register(&self.active, &req.task_id, token.clone());

        let req = match &self.config.before_execute {
            Some(callback) => callback(req).instrument(callback_span("before_execute")).await?,
            None => req,
        };

        let content = message_to_content(&req.message, &self.config.a2a_part_converter)?;
        let meta = to_invocation_meta(&self.config.app_name, &req.context_id, Some(&req.metadata));
        record_session(&meta.session_id);

        let bound = self.prepare_session(&meta).await;
        if canceled(&token) {
            return Ok(());
        }
        if let Err(e) = bound {
            warn!(error = %e, "session binding failed");
            let message = format!("failed to prepare session: {e}");
            let terminal = failed_update(&req, &meta, &message);
            let ctx = executor_context(&req, &meta, EventLog::default(), Some(message));
            return self.finish(ctx, terminal, queue).await;
        }

        if req.stored_task.is_none() {
            queue.write(status_update(&req, &meta, TaskState::Submitted, None).into()).await?;
        }
        queue.write(status_update(&req, &meta, TaskState::Working, None).into()).await?;

        let invocation = Arc::new(A2aInvocation {
            invocation_id: uuid::Uuid::new_v4().to_string(),
            agent_name: self.config.agent.name().to_string(),
            user_id: meta.user_id.clone(),
            app_name: self.config.app_name.clone(),
            session_id: meta.session_id.clone(),
            user_content: content,
            run_config: self.config.run_config.clone(),
            token: token.clone(),
        });
        info!(invocation_id = %invocation.invocation_id, agent = %invocation.agent_name, "starting agent run");

        let mut run = RunState::default();
        if let Err(e) = self.persist_user_content(&invocation).await {
            run.error = Some(format!("failed to save event: {e}"));
        } else if !token.is_cancelled() {
            let mut maker = self.config.output_mode.artifact_maker(&req.task_id, &req.context_id);
            self.consume(&req, &meta, invocation.clone(), maker.as_mut(), &mut run, queue).await?;

            if !token.is_cancelled() {
                if let Some(reset) = maker.finalize() {
                    queue.write(reset.into()).await?;
                }
            }
        }
        if canceled(&token) {
            return Ok(());
        }

        let terminal = self.terminal_update(&req, &meta, &invocation, &run)?;
        let ctx = executor_context(&req, &meta, run.events, run.error);
        self.finish(ctx, terminal, queue).await
    }

    /// Pull the agent stream until it ends, fails or the task is canceled.
    /// Only queue write failures escape as errors; everything else is
    /// recorded on `run`.
    async fn consume(
        &self,
        req: &RequestContext,
        meta: &InvocationMeta,
        invocation: Arc<A2aInvocation>,
        maker: &mut dyn ArtifactMaker,
        run: &mut RunState,
        queue: &dyn EventQueue,
    ) -> Result<()> {
        let token = invocation.token.clone();
        let mut stream = match self.config.agent.run(invocation.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                run.error = Some(format!("agent run failed: {e}"));
                return Ok(());
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                next = stream.next() => next,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) if e.is_cancelled() && token.is_cancelled() => return Ok(()),
                Some(Err(e)) => {
                    warn!(error = %e, "agent stream failed");
                    run.error = Some(format!("agent run failed: {e}"));
                    return Ok(());
                }
                None => return Ok(()),
            };

            if !event.is_partial() {
                if let Err(e) = self.persist(&invocation, event.clone()).await {
                    run.error = Some(format!("failed to save event: {e}"));
                    return Ok(());
                }
                run.observe(&event);
            }
            if event.is_partial() && self.config.run_config.streaming_mode == StreamingMode::None {
                continue;
            }

            let parts = match event.content() {
                Some(content) => {
                    adk_parts_to_a2a(&self.config.adk_part_converter, &event, &content.parts)
                }
                None => Ok(Vec::new()),
            };
            let parts = match parts {
                Ok(parts) => parts,
                Err(e) => {
                    run.error = Some(format!("processor failed: {e}"));
                    return Ok(());
                }
            };

            let metadata = to_event_meta(meta, &event);
            let Some(update) = maker.transform(&event, parts, metadata) else {
                continue;
            };

            let update = match &self.config.after_event {
                Some(callback) => {
                    let ctx = Arc::new(executor_context(req, meta, run.events.clone(), None));
                    match callback(ctx, event, update).instrument(callback_span("after_event")).await
                    {
                        Ok(update) => update,
                        Err(e) => {
                            warn!(error = %e, "after-event callback rejected an update");
                            run.error = Some(format!("processor failed: {e}"));
                            return Ok(());
                        }
                    }
                }
                None => update,
            };

            debug!(
                artifact_id = %update.artifact.artifact_id,
                append = update.append,
                last_chunk = update.last_chunk,
                "writing artifact update"
            );
            queue.write(update.into()).await?;
        }
    }

    fn terminal_update(
        &self,
        req: &RequestContext,
        meta: &InvocationMeta,
        invocation: &A2aInvocation,
        run: &RunState,
    ) -> Result<TaskStatusUpdateEvent> {
        if let Some(error) = &run.error {
            return Ok(failed_update(req, meta, error));
        }
        if let Some(error) = &run.event_error {
            return Ok(failed_update(req, meta, error));
        }
        if !run.pending_calls.is_empty() {
            let mut event = Event::new(&invocation.invocation_id).with_author(&invocation.agent_name);
            event.long_running_tool_ids = run.pending_calls.iter().map(|(id, _)| id.clone()).collect();
            event.set_content(Content {
                role: "model".to_string(),
                parts: run.pending_calls.iter().map(|(_, call)| call.clone()).collect(),
            });
            let mut message = event_to_message(&event, &self.config.adk_part_converter)?;
            message.task_id = Some(req.task_id.clone());
            message.context_id = Some(req.context_id.clone());
            return Ok(status_update(req, meta, TaskState::InputRequired, Some(message)).into_final());
        }
        Ok(status_update(req, meta, TaskState::Completed, None).into_final())
    }

    /// Run the after-execute hook and write the final update. The update is
    /// written even when the hook fails; the hook's error is then returned.
    async fn finish(
        &self,
        ctx: ExecutorContext,
        terminal: TaskStatusUpdateEvent,
        queue: &dyn EventQueue,
    ) -> Result<()> {
        let (mut terminal, hook_error) = match &self.config.after_execute {
            Some(callback) => {
                match callback(Arc::new(ctx), terminal.clone())
                    .instrument(callback_span("after_execute"))
                    .await
                {
                    Ok(rewritten) => (rewritten, None),
                    Err(e) => {
                        warn!(error = %e, "after-execute callback failed");
                        (terminal, Some(e))
                    }
                }
            }
            None => (terminal, None),
        };
        terminal.final_update = true;

        info!(state = ?terminal.status.state, "task execution finished");
        queue.write(terminal.into()).await?;

        match hook_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop the execution of `req.task_id`, if one is running, and report the
    /// task as canceled. Only a failed queue write is returned as an error.
    pub async fn cancel(&self, req: RequestContext, queue: &dyn EventQueue) -> Result<()> {
        let span = a2a_cancel_span(&req.task_id, &req.context_id);
        async move {
            let token = self
                .active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&req.task_id)
                .cloned();
            match token {
                Some(token) => {
                    info!("canceling in-flight execution");
                    token.cancel();
                }
                None => debug!("no in-flight execution to cancel"),
            }

            let meta =
                to_invocation_meta(&self.config.app_name, &req.context_id, Some(&req.metadata));
            let update = status_update(&req, &meta, TaskState::Canceled, None).into_final();
            queue.write(update.into()).await
        }
        .instrument(span)
        .await
    }

    /// Resolve the context's session, creating it on first use.
    async fn prepare_session(&self, meta: &InvocationMeta) -> Result<()> {
        let service = &self.config.session_service;
        let existing = service
            .get(GetRequest::new(&self.config.app_name, &meta.user_id, &meta.session_id))
            .await;
        if existing.is_ok() {
            return Ok(());
        }

        debug!("creating session");
        service
            .create(CreateRequest {
                app_name: self.config.app_name.clone(),
                user_id: meta.user_id.clone(),
                session_id: Some(meta.session_id.clone()),
                state: HashMap::new(),
            })
            .await?;
        Ok(())
    }

    async fn persist_user_content(&self, invocation: &A2aInvocation) -> Result<()> {
        if invocation.user_content.is_empty() {
            return Ok(());
        }
        let mut event = Event::new(&invocation.invocation_id).with_author("user");
        event.set_content(invocation.user_content.clone());
        self.persist(invocation, event).await
    }

    async fn persist(&self, invocation: &A2aInvocation, event: Event) -> Result<()> {
        self.config
            .session_service
            .append_event(AppendEventRequest {
                app_name: invocation.app_name.clone(),
                user_id: invocation.user_id.clone(),
                session_id: invocation.session_id.clone(),
                event,
            })
            .await
    }
}

/// What the consumption loop learned about the run.
#[derive(Default)]
struct RunState {
    events: EventLog,
    error: Option<String>,
    /// First error reported in-band by an agent event.
    event_error: Option<String>,
    /// Long-running calls without a response yet, keyed by call id.
    pending_calls: Vec<(String, Part)>,
}

impl RunState {
    fn observe(&mut self, event: &Event) {
        if self.event_error.is_none() {
            if let Some(code) = &event.llm_response.error_code {
                let message = event.llm_response.error_message.as_deref().unwrap_or_default();
                self.event_error = Some(format!("{code}: {message}"));
            }
        }

        if let Some(content) = event.content() {
            for part in &content.parts {
                if let Part::FunctionResponse { function_response, id } = part {
                    let answered = id.as_deref().unwrap_or(&function_response.name);
                    self.pending_calls.retain(|(call_id, _)| call_id != answered);
                }
            }
        }
        for call in event.long_running_calls() {
            if let Part::FunctionCall { name, id, .. } = call {
                let call_id = id.clone().unwrap_or_else(|| name.clone());
                self.pending_calls.push((call_id, call.clone()));
            }
        }

        self.events.push(event.clone());
    }
}

/// Keeps a task's cancellation token registered while its execution runs.
struct ActiveTask {
    active: ActiveTasks,
    task_id: String,
}

impl ActiveTask {
    fn register(active: &ActiveTasks, task_id: &str, token: CancellationToken) -> Self {
        active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id.to_string(), token);
        Self { active: active.clone(), task_id: task_id.to_string() }
    }
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.task_id);
    }
}

struct A2aInvocation {
    invocation_id: String,
    agent_name: String,
    user_id: String,
    app_name: String,
    session_id: String,
    user_content: Content,
    run_config: RunConfig,
    token: CancellationToken,
}

impl InvocationContext for A2aInvocation {
    fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn user_content(&self) -> &Content {
        &self.user_content
    }

    fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }
}

/// The cancel request owns the final update once the token has fired.
fn canceled(token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        info!("execution canceled, leaving the final update to the cancel request");
        return true;
    }
    false
}

fn executor_context(
    req: &RequestContext,
    meta: &InvocationMeta,
    events: EventLog,
    run_error: Option<String>,
) -> ExecutorContext {
    ExecutorContext::new(
        req.clone(),
        meta.user_id.clone(),
        meta.session_id.clone(),
        events,
        run_error,
    )
}

fn status_update(
    req: &RequestContext,
    meta: &InvocationMeta,
    state: TaskState,
    message: Option<Message>,
) -> TaskStatusUpdateEvent {
    let mut update = TaskStatusUpdateEvent::new(&req.task_id, &req.context_id, state, message);
    update.metadata = Some(meta.event_meta.clone());
    update
}

fn failed_update(req: &RequestContext, meta: &InvocationMeta, text: &str) -> TaskStatusUpdateEvent {
    let message = Message::builder()
        .role(Role::Agent)
        .parts(vec![A2aPart::text(text)])
        .task_id(&req.task_id)
        .context_id(&req.context_id)
        .build();
    status_update(req, meta, TaskState::Failed, Some(message)).into_final()
}
