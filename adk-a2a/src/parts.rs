//! Part converters between ADK content and A2A parts.
//!
//! Converters are pluggable: a converter returning `Ok(None)` filters the part
//! out, and one returning a different part rewrites it.

use crate::metadata::{KEY_IS_LONG_RUNNING, KEY_THOUGHT, KEY_TYPE};
use crate::types::{self as a2a, FileContent, UpdateEvent};
use adk_core::{AdkError, Event, FunctionResponseData, Part, Result};
use base64::{Engine as _, engine::general_purpose};
use serde_json::{Map, Value};
use std::sync::Arc;

const TYPE_FUNCTION_CALL: &str = "function_call";
const TYPE_FUNCTION_RESPONSE: &str = "function_response";
const KEY_THOUGHT_SIGNATURE: &str = "adk_thought_signature";

/// Converts one ADK part of an outgoing event.
pub type AdkPartConverter = Arc<dyn Fn(&Event, &Part) -> Result<Option<a2a::Part>> + Send + Sync>;

/// Converts one A2A part of an incoming protocol event or message.
pub type A2aPartConverter =
    Arc<dyn Fn(&UpdateEvent, &a2a::Part) -> Result<Option<Part>> + Send + Sync>;

pub fn default_adk_part_converter() -> AdkPartConverter {
    Arc::new(adk_part_to_a2a)
}

pub fn default_a2a_part_converter() -> A2aPartConverter {
    Arc::new(a2a_part_to_adk)
}

pub fn adk_part_to_a2a(event: &Event, part: &Part) -> Result<Option<a2a::Part>> {
    let converted = match part {
        Part::Text { text } => a2a::Part::text(text.clone()),
        Part::Thinking { thinking, signature } => {
            let part = a2a::Part::text(thinking.clone()).with_meta(KEY_THOUGHT, Value::Bool(true));
            match signature {
                Some(sig) => part.with_meta(KEY_THOUGHT_SIGNATURE, Value::String(sig.clone())),
                None => part,
            }
        }
        Part::InlineData { mime_type, data } => a2a::Part::file(FileContent {
            name: None,
            mime_type: Some(mime_type.clone()),
            bytes: Some(general_purpose::STANDARD.encode(data)),
            uri: None,
        }),
        Part::FileData { mime_type, file_uri } => a2a::Part::file(FileContent {
            name: None,
            mime_type: Some(mime_type.clone()),
            bytes: None,
            uri: Some(file_uri.clone()),
        }),
        Part::FunctionCall { name, args, id } => {
            let long_running =
                event.is_long_running(name) || id.as_ref().is_some_and(|id| event.is_long_running(id));
            let mut data = Map::new();
            data.insert("name".to_string(), Value::String(name.clone()));
            data.insert("args".to_string(), args.clone());
            if let Some(id) = id {
                data.insert("id".to_string(), Value::String(id.clone()));
            }
            a2a::Part::data(data)
                .with_meta(KEY_TYPE, Value::String(TYPE_FUNCTION_CALL.to_string()))
                .with_meta(KEY_IS_LONG_RUNNING, Value::Bool(long_running))
        }
        Part::FunctionResponse { function_response, id } => {
            let mut data = Map::new();
            data.insert("name".to_string(), Value::String(function_response.name.clone()));
            data.insert("response".to_string(), function_response.response.clone());
            if let Some(id) = id {
                data.insert("id".to_string(), Value::String(id.clone()));
            }
            a2a::Part::data(data)
                .with_meta(KEY_TYPE, Value::String(TYPE_FUNCTION_RESPONSE.to_string()))
        }
    };
    Ok(Some(converted))
}

pub fn a2a_part_to_adk(_event: &UpdateEvent, part: &a2a::Part) -> Result<Option<Part>> {
    match part {
        a2a::Part::Text { text, metadata } => {
            let meta = metadata.as_ref();
            if meta.and_then(|m| m.get(KEY_THOUGHT)).and_then(Value::as_bool) == Some(true) {
                let signature = meta
                    .and_then(|m| m.get(KEY_THOUGHT_SIGNATURE))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok(Some(Part::Thinking { thinking: text.clone(), signature }));
            }
            Ok(Some(Part::Text { text: text.clone() }))
        }
        a2a::Part::File { file, .. } => {
            let mime_type = file.mime_type.clone().unwrap_or_default();
            if let Some(bytes) = &file.bytes {
                let data = general_purpose::STANDARD
                    .decode(bytes)
                    .map_err(|e| AdkError::Conversion(format!("base64 decode error: {}", e)))?;
                Ok(Some(Part::InlineData { mime_type, data }))
            } else if let Some(uri) = &file.uri {
                Ok(Some(Part::FileData { mime_type, file_uri: uri.clone() }))
            } else {
                Err(AdkError::Conversion("file part has neither bytes nor uri".to_string()))
            }
        }
        a2a::Part::Data { data, metadata } => {
            let kind = metadata.as_ref().and_then(|m| m.get(KEY_TYPE)).and_then(Value::as_str);
            match kind {
                Some(TYPE_FUNCTION_CALL) => Ok(Some(Part::FunctionCall {
                    name: required_name(data)?,
                    args: data.get("args").cloned().unwrap_or(Value::Object(Map::new())),
                    id: optional_id(data),
                })),
                Some(TYPE_FUNCTION_RESPONSE) => Ok(Some(Part::FunctionResponse {
                    function_response: FunctionResponseData {
                        name: required_name(data)?,
                        response: data.get("response").cloned().unwrap_or(Value::Null),
                    },
                    id: optional_id(data),
                })),
                _ if data.is_empty() => Ok(None),
                _ => Ok(Some(Part::Text { text: serde_json::to_string(data)? })),
            }
        }
    }
}

fn required_name(data: &Map<String, Value>) -> Result<String> {
    data.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdkError::Conversion("missing function name".to_string()))
}

fn optional_id(data: &Map<String, Value>) -> Option<String> {
    data.get("id").and_then(Value::as_str).map(str::to_string)
}

/// Convert every part of an outgoing event, dropping filtered parts.
pub fn adk_parts_to_a2a(
    converter: &AdkPartConverter,
    event: &Event,
    parts: &[Part],
) -> Result<Vec<a2a::Part>> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if let Some(converted) = converter(event, part)? {
            out.push(converted);
        }
    }
    Ok(out)
}

/// Convert every part of an incoming event, dropping filtered parts.
pub fn a2a_parts_to_adk(
    converter: &A2aPartConverter,
    event: &UpdateEvent,
    parts: &[a2a::Part],
) -> Result<Vec<Part>> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        if let Some(converted) = converter(event, part)? {
            out.push(converted);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use serde_json::json;

    fn inbound() -> UpdateEvent {
        UpdateEvent::Message(Message::builder().build())
    }

    #[test]
    fn test_text_conversion() {
        let event = Event::new("inv");
        let wire = adk_part_to_a2a(&event, &Part::text_part("Hello")).unwrap().unwrap();
        assert_eq!(wire.as_text(), Some("Hello"));
        assert!(wire.metadata().is_none());

        let back = a2a_part_to_adk(&inbound(), &wire).unwrap().unwrap();
        assert_eq!(back, Part::text_part("Hello"));
    }

    #[test]
    fn test_thought_flag_survives() {
        let event = Event::new("inv");
        let thought =
            Part::Thinking { thinking: "plan".into(), signature: Some("sig".into()) };
        let wire = adk_part_to_a2a(&event, &thought).unwrap().unwrap();
        assert_eq!(wire.metadata().unwrap()[KEY_THOUGHT], json!(true));

        let back = a2a_part_to_adk(&inbound(), &wire).unwrap().unwrap();
        assert_eq!(back, thought);
    }

    #[test]
    fn test_function_call_long_running_flag() {
        let mut event = Event::new("inv");
        event.long_running_tool_ids = vec!["approve".into()];
        let call = Part::function_call("approve", json!({"amount": 10}));

        let wire = adk_part_to_a2a(&event, &call).unwrap().unwrap();
        let meta = wire.metadata().unwrap();
        assert_eq!(meta[KEY_TYPE], json!("function_call"));
        assert_eq!(meta[KEY_IS_LONG_RUNNING], json!(true));

        let back = a2a_part_to_adk(&inbound(), &wire).unwrap().unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn test_function_response_conversion() {
        let event = Event::new("inv");
        let resp = Part::FunctionResponse {
            function_response: FunctionResponseData {
                name: "lookup".into(),
                response: json!({"ok": true}),
            },
            id: Some("call-1".into()),
        };
        let wire = adk_part_to_a2a(&event, &resp).unwrap().unwrap();
        let back = a2a_part_to_adk(&inbound(), &wire).unwrap().unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_inline_data_base64() {
        let event = Event::new("inv");
        let blob = Part::InlineData { mime_type: "image/png".into(), data: vec![0x89, 0x50] };
        let wire = adk_part_to_a2a(&event, &blob).unwrap().unwrap();
        match &wire {
            a2a::Part::File { file, .. } => assert_eq!(file.bytes.as_deref(), Some("iVA=")),
            other => panic!("expected file part, got {other:?}"),
        }
        assert_eq!(a2a_part_to_adk(&inbound(), &wire).unwrap().unwrap(), blob);
    }

    #[test]
    fn test_bad_base64_is_error() {
        let part = a2a::Part::file(FileContent {
            name: None,
            mime_type: None,
            bytes: Some("***".into()),
            uri: None,
        });
        assert!(a2a_part_to_adk(&inbound(), &part).is_err());
    }

    #[test]
    fn test_plain_data_parts() {
        let empty = a2a::Part::data(Map::new());
        assert!(a2a_part_to_adk(&inbound(), &empty).unwrap().is_none());

        let mut data = Map::new();
        data.insert("k".into(), json!(1));
        let converted = a2a_part_to_adk(&inbound(), &a2a::Part::data(data)).unwrap().unwrap();
        assert_eq!(converted.text(), Some(r#"{"k":1}"#));
    }

    #[test]
    fn test_custom_converter_filters() {
        let only_text: AdkPartConverter = Arc::new(|event: &Event, part: &Part| match part {
            Part::Text { .. } => adk_part_to_a2a(event, part),
            _ => Ok(None),
        });
        let event = Event::new("inv");
        let parts = vec![Part::thinking_part("x"), Part::text_part("y")];
        let converted = adk_parts_to_a2a(&only_text, &event, &parts).unwrap();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].as_text(), Some("y"));
    }
}
