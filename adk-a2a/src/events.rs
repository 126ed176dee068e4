use crate::metadata::{apply_event_meta, legacy_partial_flag, set_actions_meta};
use crate::parts::{A2aPartConverter, AdkPartConverter, a2a_parts_to_adk, adk_parts_to_a2a};
use crate::types::{Message, Role, TaskState, UpdateEvent};
use adk_core::{Content, Event, Part, Result};
use serde_json::{Map, Value};

/// Convert an inbound protocol message to user content. A message whose parts
/// are all filtered becomes empty content, which is still a valid turn.
pub fn message_to_content(message: &Message, converter: &A2aPartConverter) -> Result<Content> {
    let source = UpdateEvent::Message(message.clone());
    let parts = a2a_parts_to_adk(converter, &source, &message.parts)?;
    Ok(Content { role: "user".to_string(), parts })
}

pub fn event_to_message(event: &Event, converter: &AdkPartConverter) -> Result<Message> {
    let role = if event.author == "user" { Role::User } else { Role::Agent };

    let parts = match event.content() {
        Some(content) => adk_parts_to_a2a(converter, event, &content.parts)?,
        None => Vec::new(),
    };

    let metadata = set_actions_meta(Map::new(), event);

    Ok(Message::builder()
        .role(role)
        .parts(parts)
        .message_id(event.id.clone())
        .metadata(if metadata.is_empty() { None } else { Some(metadata) })
        .build())
}

/// Convert one protocol event received from a remote agent into a session
/// event authored by `agent_name`.
///
/// Artifact updates become partial events; the run processor decides when a
/// coherent non-partial event exists. Producers using the legacy marker have
/// already made that decision and their flag is taken as is. Returns `None`
/// when the protocol event carries nothing worth recording.
pub fn to_session_event(
    update: &UpdateEvent,
    invocation_id: &str,
    agent_name: &str,
    converter: &A2aPartConverter,
) -> Result<Option<Event>> {
    match update {
        UpdateEvent::ArtifactUpdate(ev) => {
            let parts = a2a_parts_to_adk(converter, update, &ev.artifact.parts)?;
            if parts.is_empty() {
                return Ok(None);
            }
            let meta = merged_meta(ev.metadata.as_ref(), ev.artifact.metadata.as_ref());
            let mut event = new_event(invocation_id, agent_name, parts);
            apply_event_meta(&mut event, &meta);
            event.llm_response.partial = legacy_partial_flag(Some(&meta)).unwrap_or(true);
            Ok(Some(event))
        }
        UpdateEvent::StatusUpdate(ev) => {
            let parts = match &ev.status.message {
                Some(msg) => a2a_parts_to_adk(converter, update, &msg.parts)?,
                None => Vec::new(),
            };
            let failed = ev.status.state == TaskState::Failed;
            if parts.is_empty() && !failed {
                return Ok(None);
            }

            let mut event = new_event(invocation_id, agent_name, parts);
            if let Some(meta) = &ev.metadata {
                apply_event_meta(&mut event, meta);
            }
            if failed {
                mark_failed(&mut event, ev.status.message.as_ref());
            }
            if ev.status.state == TaskState::InputRequired {
                event.long_running_tool_ids = pending_call_ids(&event);
            }
            event.llm_response.turn_complete = ev.final_update;
            Ok(Some(event))
        }
        UpdateEvent::Task(task) => {
            let mut parts = Vec::new();
            for artifact in &task.artifacts {
                parts.extend(a2a_parts_to_adk(converter, update, &artifact.parts)?);
            }
            if let Some(msg) = &task.status.message {
                parts.extend(a2a_parts_to_adk(converter, update, &msg.parts)?);
            }
            let failed = task.status.state == TaskState::Failed;
            if parts.is_empty() && !failed {
                return Ok(None);
            }

            let mut event = new_event(invocation_id, agent_name, parts);
            if let Some(meta) = &task.metadata {
                apply_event_meta(&mut event, meta);
            }
            if failed {
                mark_failed(&mut event, task.status.message.as_ref());
            }
            if task.status.state == TaskState::InputRequired {
                event.long_running_tool_ids = pending_call_ids(&event);
            }
            event.llm_response.turn_complete = task.status.state.is_terminal();
            Ok(Some(event))
        }
        UpdateEvent::Message(msg) => {
            let parts = a2a_parts_to_adk(converter, update, &msg.parts)?;
            if parts.is_empty() {
                return Ok(None);
            }
            let mut event = new_event(invocation_id, agent_name, parts);
            if let Some(meta) = &msg.metadata {
                apply_event_meta(&mut event, meta);
            }
            event.llm_response.turn_complete = true;
            Ok(Some(event))
        }
    }
}

fn new_event(invocation_id: &str, agent_name: &str, parts: Vec<Part>) -> Event {
    let mut event = Event::new(invocation_id).with_author(agent_name);
    if !parts.is_empty() {
        event.set_content(Content { role: "model".to_string(), parts });
    }
    event
}

fn merged_meta(
    event_meta: Option<&Map<String, Value>>,
    artifact_meta: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut meta = event_meta.cloned().unwrap_or_default();
    if let Some(artifact_meta) = artifact_meta {
        meta.extend(artifact_meta.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    meta
}

fn mark_failed(event: &mut Event, message: Option<&Message>) {
    let text = message.map(Message::text).filter(|t| !t.is_empty());
    let resp = &mut event.llm_response;
    if resp.error_message.is_none() {
        resp.error_message = Some(text.unwrap_or_else(|| "remote task failed".to_string()));
    }
}

fn pending_call_ids(event: &Event) -> Vec<String> {
    let Some(content) = event.content() else {
        return Vec::new();
    };
    content
        .parts
        .iter()
        .filter_map(|part| match part {
            Part::FunctionCall { name, id, .. } => Some(id.clone().unwrap_or_else(|| name.clone())),
            _ => None,
        })
        .collect()
}
