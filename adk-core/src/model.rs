use crate::types::Content;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One model turn as it appears inside an [`Event`](crate::Event).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: Option<Content>,
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_metadata: Option<CitationMetadata>,
    /// Free-form metadata attached by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<HashMap<String, serde_json::Value>>,
    /// Incomplete increment of output; not safe to persist as final.
    pub partial: bool,
    pub turn_complete: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Token accounting. Producers send cumulative snapshots, so consumers keep the
/// latest value instead of summing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_token_count: i32,
    pub candidates_token_count: i32,
    pub total_token_count: i32,
}

/// Citation metadata emitted by model providers for source attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitationMetadata {
    pub citation_sources: Vec<CitationSource>,
}

/// One citation source with optional offsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CitationSource {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub start_index: Option<i32>,
    pub end_index: Option<i32>,
    pub license: Option<String>,
    pub publication_date: Option<String>,
}

/// Search grounding attached to a response. Like usage, a cumulative snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub web_search_queries: Vec<String>,
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroundingChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl LlmResponse {
    pub fn new(content: Content) -> Self {
        Self {
            content: Some(content),
            turn_complete: true,
            ..Default::default()
        }
    }

    /// A streaming increment.
    pub fn partial(content: Content) -> Self {
        Self { content: Some(content), partial: true, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_response_new_is_final() {
        let resp = LlmResponse::new(Content::new("model").with_text("done"));
        assert!(!resp.partial);
        assert!(resp.turn_complete);
    }

    #[test]
    fn test_llm_response_partial() {
        let resp = LlmResponse::partial(Content::new("model").with_text("do"));
        assert!(resp.partial);
        assert!(!resp.turn_complete);
    }

    #[test]
    fn test_citation_serialization_is_camel_case() {
        let meta = CitationMetadata {
            citation_sources: vec![CitationSource {
                uri: Some("https://example.com".into()),
                start_index: Some(3),
                ..Default::default()
            }],
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["citationSources"][0]["startIndex"], 3);
    }
}
