use adk_core::{CitationMetadata, Event, GroundingMetadata, UsageMetadata};
use serde_json::{Map, Value};

pub const KEY_APP_NAME: &str = "adk_app_name";
pub const KEY_USER_ID: &str = "adk_user_id";
pub const KEY_SESSION_ID: &str = "adk_session_id";
pub const KEY_INVOCATION_ID: &str = "adk_invocation_id";
pub const KEY_AUTHOR: &str = "adk_author";
pub const KEY_BRANCH: &str = "adk_branch";
pub const KEY_USAGE: &str = "adk_usage_metadata";
pub const KEY_GROUNDING: &str = "adk_grounding_metadata";
pub const KEY_CITATION: &str = "adk_citation_metadata";
pub const KEY_CUSTOM: &str = "adk_custom_metadata";
pub const KEY_ERROR_CODE: &str = "adk_error_code";
pub const KEY_ERROR_MESSAGE: &str = "adk_error_message";
pub const KEY_ESCALATE: &str = "adk_escalate";
pub const KEY_TRANSFER_TO_AGENT: &str = "adk_transfer_to_agent";
/// Legacy marker: the producer already aggregated chunks; consumers pass through.
pub const KEY_PARTIAL: &str = "adk_partial";
/// Part-level flag for reasoning text.
pub const KEY_THOUGHT: &str = "adk_thought";
pub const KEY_TYPE: &str = "adk_type";
pub const KEY_IS_LONG_RUNNING: &str = "adk_is_long_running";

#[derive(Clone)]
pub struct InvocationMeta {
    pub user_id: String,
    pub session_id: String,
    pub event_meta: Map<String, Value>,
}

// user_id never reaches logs in cleartext
impl std::fmt::Debug for InvocationMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationMeta")
            .field("user_id", &"[REDACTED]")
            .field("session_id", &self.session_id)
            .field("event_meta_keys", &self.event_meta.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Derive the internal session identity for a protocol context.
///
/// The session id is the context id itself, so repeated turns on one context
/// land in one session and distinct contexts never share a session.
/// `request_meta` entries (e.g. trace ids added by a before-execute callback)
/// are carried onto every event emitted for the invocation.
pub fn to_invocation_meta(
    app_name: &str,
    context_id: &str,
    request_meta: Option<&Map<String, Value>>,
) -> InvocationMeta {
    let user_id = format!("A2A_USER_{}", context_id);
    let session_id = context_id.to_string();

    let mut event_meta = request_meta.cloned().unwrap_or_default();
    event_meta.insert(KEY_APP_NAME.to_string(), Value::String(app_name.to_string()));
    event_meta.insert(KEY_USER_ID.to_string(), Value::String(user_id.clone()));
    event_meta.insert(KEY_SESSION_ID.to_string(), Value::String(session_id.clone()));

    InvocationMeta { user_id, session_id, event_meta }
}

/// Invocation metadata plus everything the event itself carries.
pub fn to_event_meta(meta: &InvocationMeta, event: &Event) -> Map<String, Value> {
    let mut result = meta.event_meta.clone();

    result.insert(KEY_INVOCATION_ID.to_string(), Value::String(event.invocation_id.clone()));
    result.insert(KEY_AUTHOR.to_string(), Value::String(event.author.clone()));
    if !event.branch.is_empty() {
        result.insert(KEY_BRANCH.to_string(), Value::String(event.branch.clone()));
    }

    let resp = &event.llm_response;
    insert_json(&mut result, KEY_USAGE, resp.usage_metadata.as_ref());
    insert_json(&mut result, KEY_GROUNDING, resp.grounding_metadata.as_ref());
    insert_json(&mut result, KEY_CITATION, resp.citation_metadata.as_ref());
    insert_json(&mut result, KEY_CUSTOM, resp.custom_metadata.as_ref());
    if let Some(code) = &resp.error_code {
        result.insert(KEY_ERROR_CODE.to_string(), Value::String(code.clone()));
    }
    if let Some(message) = &resp.error_message {
        result.insert(KEY_ERROR_MESSAGE.to_string(), Value::String(message.clone()));
    }

    set_actions_meta(result, event)
}

fn insert_json<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    if let Some(value) = value.and_then(|v| serde_json::to_value(v).ok()) {
        map.insert(key.to_string(), value);
    }
}

pub fn set_actions_meta(mut meta: Map<String, Value>, event: &Event) -> Map<String, Value> {
    if event.actions.escalate {
        meta.insert(KEY_ESCALATE.to_string(), Value::Bool(true));
    }
    if let Some(agent) = &event.actions.transfer_to_agent {
        meta.insert(KEY_TRANSFER_TO_AGENT.to_string(), Value::String(agent.clone()));
    }
    meta
}

/// Restore metadata written by [`to_event_meta`] onto a client-side event.
/// Entries that fail to parse are ignored.
pub fn apply_event_meta(event: &mut Event, meta: &Map<String, Value>) {
    let resp = &mut event.llm_response;
    if let Some(usage) = parse::<UsageMetadata>(meta, KEY_USAGE) {
        resp.usage_metadata = Some(usage);
    }
    if let Some(grounding) = parse::<GroundingMetadata>(meta, KEY_GROUNDING) {
        resp.grounding_metadata = Some(grounding);
    }
    if let Some(citations) = parse::<CitationMetadata>(meta, KEY_CITATION) {
        resp.citation_metadata = Some(citations);
    }
    if let Some(custom) = parse(meta, KEY_CUSTOM) {
        resp.custom_metadata = Some(custom);
    }
    if let Some(Value::String(code)) = meta.get(KEY_ERROR_CODE) {
        resp.error_code = Some(code.clone());
    }
    if let Some(Value::String(message)) = meta.get(KEY_ERROR_MESSAGE) {
        resp.error_message = Some(message.clone());
    }
    if let Some(Value::Bool(true)) = meta.get(KEY_ESCALATE) {
        event.actions.escalate = true;
    }
    if let Some(Value::String(agent)) = meta.get(KEY_TRANSFER_TO_AGENT) {
        event.actions.transfer_to_agent = Some(agent.clone());
    }
}

fn parse<T: serde::de::DeserializeOwned>(meta: &Map<String, Value>, key: &str) -> Option<T> {
    meta.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// The legacy partial flag, if the producer stamped one.
pub fn legacy_partial_flag(meta: Option<&Map<String, Value>>) -> Option<bool> {
    meta.and_then(|m| m.get(KEY_PARTIAL)).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{Content, LlmResponse};
    use serde_json::json;

    #[test]
    fn test_session_id_follows_context() {
        let a = to_invocation_meta("app", "ctx-1", None);
        let b = to_invocation_meta("app", "ctx-1", None);
        let c = to_invocation_meta("app", "ctx-2", None);
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.user_id, b.user_id);
        assert_ne!(a.session_id, c.session_id);
        assert_eq!(a.event_meta[KEY_APP_NAME], json!("app"));
    }

    #[test]
    fn test_request_meta_propagates() {
        let mut extra = Map::new();
        extra.insert("trace_id".into(), json!("abc"));
        let meta = to_invocation_meta("app", "ctx", Some(&extra));
        assert_eq!(meta.event_meta["trace_id"], json!("abc"));
    }

    #[test]
    fn test_debug_redacts_user() {
        let meta = to_invocation_meta("app", "ctx", None);
        let rendered = format!("{meta:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("A2A_USER_ctx"));
    }

    #[test]
    fn test_event_meta_round_trip() {
        let meta = to_invocation_meta("app", "ctx", None);
        let mut event = Event::new("inv-1").with_author("writer");
        event.llm_response = LlmResponse::new(Content::new("model").with_text("x"));
        event.llm_response.usage_metadata = Some(UsageMetadata {
            prompt_token_count: 1,
            candidates_token_count: 2,
            total_token_count: 3,
        });
        event.llm_response.error_code = Some("SAFETY".into());
        event.actions.transfer_to_agent = Some("other".into());

        let wire = to_event_meta(&meta, &event);
        assert_eq!(wire[KEY_INVOCATION_ID], json!("inv-1"));
        assert_eq!(wire[KEY_AUTHOR], json!("writer"));
        assert!(!wire.contains_key(KEY_BRANCH));

        let mut restored = Event::new("inv-1");
        apply_event_meta(&mut restored, &wire);
        assert_eq!(restored.llm_response.usage_metadata, event.llm_response.usage_metadata);
        assert_eq!(restored.llm_response.error_code.as_deref(), Some("SAFETY"));
        assert_eq!(restored.actions.transfer_to_agent.as_deref(), Some("other"));
    }

    #[test]
    fn test_legacy_partial_flag() {
        let mut meta = Map::new();
        assert_eq!(legacy_partial_flag(Some(&meta)), None);
        meta.insert(KEY_PARTIAL.into(), json!(false));
        assert_eq!(legacy_partial_flag(Some(&meta)), Some(false));
        assert_eq!(legacy_partial_flag(None), None);
    }
}
