//! The subset of the A2A wire types the bridge produces and consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    /// Base64-encoded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
    File {
        file: FileContent,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
    Data {
        data: Map<String, Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Map<String, Value>>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into(), metadata: None }
    }

    pub fn file(file: FileContent) -> Self {
        Part::File { file, metadata: None }
    }

    pub fn data(data: Map<String, Value>) -> Self {
        Part::Data { data, metadata: None }
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        match self {
            Part::Text { metadata, .. } | Part::File { metadata, .. } | Part::Data { metadata, .. } => {
                metadata.as_ref()
            }
        }
    }

    /// Set one metadata entry, creating the map if needed.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        let slot = match &mut self {
            Part::Text { metadata, .. } | Part::File { metadata, .. } | Part::Data { metadata, .. } => {
                metadata
            }
        };
        slot.get_or_insert_with(Map::new).insert(key.into(), value);
        self
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none", rename = "taskId")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "contextId")]
    pub context_id: Option<String>,
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    role: Option<Role>,
    parts: Vec<Part>,
    metadata: Option<Map<String, Value>>,
    message_id: Option<String>,
    task_id: Option<String>,
    context_id: Option<String>,
}

impl MessageBuilder {
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn parts(mut self, parts: Vec<Part>) -> Self {
        self.parts = parts;
        self
    }

    pub fn metadata(mut self, metadata: Option<Map<String, Value>>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    pub fn context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    pub fn build(self) -> Message {
        Message {
            role: self.role.unwrap_or(Role::User),
            parts: self.parts,
            metadata: self.metadata,
            message_id: self.message_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            task_id: self.task_id,
            context_id: self.context_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    #[serde(rename = "artifactId")]
    pub artifact_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
}

impl Artifact {
    pub fn new(artifact_id: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            name: None,
            description: None,
            parts,
            metadata: None,
            extensions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// States after which the current execution emits nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled | TaskState::InputRequired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        Self { state, message, timestamp: Some(Utc::now()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatusUpdateEvent {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(rename = "final")]
    pub final_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskStatusUpdateEvent {
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        state: TaskState,
        message: Option<Message>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(state, message),
            final_update: false,
            metadata: None,
        }
    }

    pub fn into_final(mut self) -> Self {
        self.final_update = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskArtifactUpdateEvent {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub artifact: Artifact,
    pub append: bool,
    #[serde(rename = "lastChunk")]
    pub last_chunk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Everything that can travel on a task's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UpdateEvent {
    /// Full snapshot of a task.
    Task(Task),
    Message(Message),
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl UpdateEvent {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            UpdateEvent::Task(task) => Some(&task.id),
            UpdateEvent::Message(msg) => msg.task_id.as_deref(),
            UpdateEvent::StatusUpdate(ev) => Some(&ev.task_id),
            UpdateEvent::ArtifactUpdate(ev) => Some(&ev.task_id),
        }
    }

    /// True for the status update that closes a task execution.
    pub fn is_final(&self) -> bool {
        matches!(self, UpdateEvent::StatusUpdate(ev) if ev.final_update)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        match self {
            UpdateEvent::Task(task) => task.metadata.as_ref(),
            UpdateEvent::Message(msg) => msg.metadata.as_ref(),
            UpdateEvent::StatusUpdate(ev) => ev.metadata.as_ref(),
            UpdateEvent::ArtifactUpdate(ev) => ev.metadata.as_ref(),
        }
    }
}

impl From<TaskStatusUpdateEvent> for UpdateEvent {
    fn from(ev: TaskStatusUpdateEvent) -> Self {
        UpdateEvent::StatusUpdate(ev)
    }
}

impl From<TaskArtifactUpdateEvent> for UpdateEvent {
    fn from(ev: TaskArtifactUpdateEvent) -> Self {
        UpdateEvent::ArtifactUpdate(ev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_state_wire_names() {
        assert_eq!(serde_json::to_value(TaskState::InputRequired).unwrap(), json!("input-required"));
        assert_eq!(serde_json::to_value(TaskState::Canceled).unwrap(), json!("canceled"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Submitted.is_terminal());
        assert!(!TaskState::Working.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::InputRequired.is_terminal());
    }

    #[test]
    fn test_update_event_kind_tag() {
        let ev = TaskStatusUpdateEvent::new("t1", "c1", TaskState::Working, None);
        let json = serde_json::to_value(UpdateEvent::from(ev)).unwrap();
        assert_eq!(json["kind"], "status-update");
        assert_eq!(json["taskId"], "t1");
        assert_eq!(json["final"], false);
    }

    #[test]
    fn test_artifact_update_deserialize() {
        let json = json!({
            "kind": "artifact-update",
            "taskId": "t1",
            "contextId": "c1",
            "artifact": {"artifactId": "a1", "parts": [{"text": "hi"}]},
            "append": true,
            "lastChunk": false
        });
        let ev: UpdateEvent = serde_json::from_value(json).unwrap();
        match ev {
            UpdateEvent::ArtifactUpdate(ev) => {
                assert!(ev.append);
                assert_eq!(ev.artifact.parts[0].as_text(), Some("hi"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_part_with_meta() {
        let part = Part::text("thinking").with_meta("adk_thought", json!(true));
        assert_eq!(part.metadata().unwrap()["adk_thought"], json!(true));
    }

    #[test]
    fn test_message_builder_generates_id() {
        let msg = Message::builder().parts(vec![Part::text("a"), Part::text("b")]).build();
        assert_eq!(msg.role, Role::User);
        assert!(!msg.message_id.is_empty());
        assert_eq!(msg.text(), "ab");
    }
}
