use crate::{
    AppendEventRequest, CreateRequest, DeleteRequest, GetRequest, ListRequest, Session,
    SessionService,
};
use adk_core::{AdkError, Event, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

type StateMap = HashMap<String, Value>;

#[derive(Clone)]
struct SessionData {
    id: SessionId,
    events: Vec<Event>,
    state: StateMap,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SessionId {
    app_name: String,
    user_id: String,
    session_id: String,
}

impl SessionId {
    fn new(app_name: &str, user_id: &str, session_id: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }
}

/// Process-local session store. One lock guards all sessions, which also
/// serializes appends per session.
#[derive(Clone, Default)]
pub struct InMemorySessionService {
    sessions: Arc<RwLock<HashMap<SessionId, SessionData>>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, SessionData>>> {
        self.sessions.read().map_err(|_| AdkError::Session("session store poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, SessionData>>> {
        self.sessions.write().map_err(|_| AdkError::Session("session store poisoned".into()))
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create(&self, req: CreateRequest) -> Result<Box<dyn Session>> {
        let session_id = req.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let id = SessionId::new(&req.app_name, &req.user_id, &session_id);

        let mut sessions = self.write()?;
        if sessions.contains_key(&id) {
            return Err(AdkError::Session(format!("session {session_id} already exists")));
        }

        let data = SessionData { id: id.clone(), events: Vec::new(), state: req.state, updated_at: Utc::now() };
        sessions.insert(id, data.clone());
        tracing::debug!(session.id = %session_id, "session created");

        Ok(Box::new(InMemorySession::from(data)))
    }

    async fn get(&self, req: GetRequest) -> Result<Box<dyn Session>> {
        let id = SessionId::new(&req.app_name, &req.user_id, &req.session_id);

        let sessions = self.read()?;
        let data = sessions
            .get(&id)
            .ok_or_else(|| AdkError::Session(format!("session {} not found", req.session_id)))?;

        let mut events = data.events.clone();
        if let Some(num) = req.num_recent_events {
            let start = events.len().saturating_sub(num);
            events.drain(..start);
        }
        if let Some(after) = req.after {
            events.retain(|e| e.timestamp >= after);
        }

        Ok(Box::new(InMemorySession {
            id: data.id.clone(),
            state: data.state.clone(),
            events,
            updated_at: data.updated_at,
        }))
    }

    async fn list(&self, req: ListRequest) -> Result<Vec<Box<dyn Session>>> {
        let sessions = self.read()?;
        Ok(sessions
            .values()
            .filter(|data| data.id.app_name == req.app_name && data.id.user_id == req.user_id)
            .map(|data| Box::new(InMemorySession::from(data.clone())) as Box<dyn Session>)
            .collect())
    }

    async fn delete(&self, req: DeleteRequest) -> Result<()> {
        let id = SessionId::new(&req.app_name, &req.user_id, &req.session_id);
        self.write()?.remove(&id);
        Ok(())
    }

    async fn append_event(&self, req: AppendEventRequest) -> Result<()> {
        let id = SessionId::new(&req.app_name, &req.user_id, &req.session_id);

        let mut sessions = self.write()?;
        let data = sessions
            .get_mut(&id)
            .ok_or_else(|| AdkError::Session(format!("session {} not found", req.session_id)))?;

        data.state.extend(req.event.actions.state_delta.clone());
        data.updated_at = req.event.timestamp;
        data.events.push(req.event);
        Ok(())
    }
}

struct InMemorySession {
    id: SessionId,
    state: StateMap,
    events: Vec<Event>,
    updated_at: DateTime<Utc>,
}

impl From<SessionData> for InMemorySession {
    fn from(data: SessionData) -> Self {
        Self { id: data.id, state: data.state, events: data.events, updated_at: data.updated_at }
    }
}

impl Session for InMemorySession {
    fn id(&self) -> &str {
        &self.id.session_id
    }

    fn app_name(&self) -> &str {
        &self.id.app_name
    }

    fn user_id(&self) -> &str {
        &self.id.user_id
    }

    fn state(&self) -> &HashMap<String, Value> {
        &self.state
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
