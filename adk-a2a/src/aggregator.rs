//! Client-side re-aggregation of chunked artifacts.
//!
//! Remote executors stream each artifact as a series of partial chunks. The
//! [`RunProcessor`] forwards every chunk as a partial event and, once an
//! artifact's stream completes, emits one non-partial event holding the whole
//! artifact so that only coherent output reaches the session.

use crate::events::to_session_event;
use crate::metadata::legacy_partial_flag;
use crate::parts::A2aPartConverter;
use crate::types::UpdateEvent;
use adk_core::{
    CitationMetadata, CitationSource, Content, Event, GroundingMetadata, Part, Result,
    UsageMetadata,
};
use serde_json::Value;
use std::collections::HashMap;

/// Folded state of one artifact's chunk stream.
struct ArtifactAggregation {
    text: String,
    thought: String,
    thought_signature: Option<String>,
    parts: Vec<Part>,
    citations: Vec<CitationSource>,
    custom: Option<HashMap<String, Value>>,
    grounding: Option<GroundingMetadata>,
    usage: Option<UsageMetadata>,
    long_running_tool_ids: Vec<String>,
    /// Latest folded chunk; supplies author, invocation and branch.
    template: Event,
}

impl ArtifactAggregation {
    fn new(template: Event) -> Self {
        Self {
            text: String::new(),
            thought: String::new(),
            thought_signature: None,
            parts: Vec::new(),
            citations: Vec::new(),
            custom: None,
            grounding: None,
            usage: None,
            long_running_tool_ids: Vec::new(),
            template,
        }
    }

    fn fold(&mut self, event: &Event) {
        if let Some(content) = event.content() {
            for part in &content.parts {
                match part {
                    Part::Text { text } => self.text.push_str(text),
                    Part::Thinking { thinking, signature } => {
                        self.thought.push_str(thinking);
                        if signature.is_some() {
                            self.thought_signature = signature.clone();
                        }
                    }
                    other => {
                        self.promote_buffers();
                        self.parts.push(other.clone());
                    }
                }
            }
        }

        let resp = &event.llm_response;
        if let Some(citations) = &resp.citation_metadata {
            self.citations.extend(citations.citation_sources.iter().cloned());
        }
        if let Some(custom) = &resp.custom_metadata {
            let merged = self.custom.get_or_insert_with(HashMap::new);
            merged.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if resp.grounding_metadata.is_some() {
            self.grounding = resp.grounding_metadata.clone();
        }
        if resp.usage_metadata.is_some() {
            self.usage = resp.usage_metadata.clone();
        }
        for id in &event.long_running_tool_ids {
            if !self.long_running_tool_ids.contains(id) {
                self.long_running_tool_ids.push(id.clone());
            }
        }
        self.template = event.clone();
    }

    /// Move buffered text into parts, thought first.
    fn promote_buffers(&mut self) {
        if !self.thought.is_empty() {
            self.parts.push(Part::Thinking {
                thinking: std::mem::take(&mut self.thought),
                signature: self.thought_signature.take(),
            });
        }
        if !self.text.is_empty() {
            self.parts.push(Part::Text { text: std::mem::take(&mut self.text) });
        }
    }

    /// The aggregated non-partial event, or `None` if nothing was folded.
    fn into_event(mut self) -> Option<Event> {
        self.promote_buffers();
        if self.parts.is_empty() {
            return None;
        }

        let template = self.template;
        let mut event = Event::new(template.invocation_id).with_author(template.author);
        event.branch = template.branch;
        event.actions = template.actions;
        event.long_running_tool_ids = self.long_running_tool_ids;

        let resp = &mut event.llm_response;
        resp.content = Some(Content { role: "model".to_string(), parts: self.parts });
        resp.citation_metadata = (!self.citations.is_empty())
            .then(|| CitationMetadata { citation_sources: self.citations });
        resp.custom_metadata = self.custom;
        resp.grounding_metadata = self.grounding;
        resp.usage_metadata = self.usage;
        resp.error_code = template.llm_response.error_code;
        resp.error_message = template.llm_response.error_message;
        resp.partial = false;
        Some(event)
    }
}

/// Turns the protocol events of one outbound request back into session events.
///
/// One processor per request; its state is never shared.
pub struct RunProcessor {
    invocation_id: String,
    agent_name: String,
    converter: A2aPartConverter,
    aggregations: HashMap<String, ArtifactAggregation>,
    /// Artifact ids, least recently updated first.
    order: Vec<String>,
}

impl RunProcessor {
    pub fn new(
        invocation_id: impl Into<String>,
        agent_name: impl Into<String>,
        converter: A2aPartConverter,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            agent_name: agent_name.into(),
            converter,
            aggregations: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Convert one protocol event and aggregate it.
    pub fn process(&mut self, update: &UpdateEvent) -> Result<Vec<Event>> {
        let event =
            to_session_event(update, &self.invocation_id, &self.agent_name, &self.converter)?;
        Ok(self.aggregate_partial(update, event))
    }

    /// Decide which session events `update` (already converted to `event`)
    /// produces, in emission order.
    pub fn aggregate_partial(&mut self, update: &UpdateEvent, event: Option<Event>) -> Vec<Event> {
        if is_pre_aggregated(update) {
            return event.into_iter().collect();
        }

        let artifact_update = match update {
            UpdateEvent::StatusUpdate(status) if status.final_update => {
                let mut out = self.flush_all();
                out.extend(event);
                return out;
            }
            UpdateEvent::Task(_) => {
                self.reset();
                return event.into_iter().collect();
            }
            UpdateEvent::ArtifactUpdate(artifact_update) => artifact_update,
            _ => return event.into_iter().collect(),
        };

        let artifact_id = artifact_update.artifact.artifact_id.as_str();
        if !artifact_update.append {
            self.remove(artifact_id);
            if artifact_update.last_chunk {
                return event
                    .map(|mut event| {
                        event.llm_response.partial = false;
                        event
                    })
                    .into_iter()
                    .collect();
            }
        }

        let mut out = Vec::new();
        if let Some(event) = event {
            match self.aggregations.get_mut(artifact_id) {
                Some(aggregation) => aggregation.fold(&event),
                None => {
                    let mut aggregation = ArtifactAggregation::new(event.clone());
                    aggregation.fold(&event);
                    self.aggregations.insert(artifact_id.to_string(), aggregation);
                }
            }
            self.touch(artifact_id);
            out.push(event);
        }

        if artifact_update.last_chunk {
            if let Some(flushed) = self.remove(artifact_id).and_then(ArtifactAggregation::into_event)
            {
                out.push(flushed);
            }
        }
        out
    }

    /// Whether any artifact stream is still open.
    pub fn has_pending(&self) -> bool {
        !self.aggregations.is_empty()
    }

    fn touch(&mut self, artifact_id: &str) {
        self.order.retain(|id| id != artifact_id);
        self.order.push(artifact_id.to_string());
    }

    fn remove(&mut self, artifact_id: &str) -> Option<ArtifactAggregation> {
        self.order.retain(|id| id != artifact_id);
        self.aggregations.remove(artifact_id)
    }

    fn flush_all(&mut self) -> Vec<Event> {
        let order = std::mem::take(&mut self.order);
        let mut out = Vec::with_capacity(order.len());
        for artifact_id in order {
            if let Some(event) =
                self.aggregations.remove(&artifact_id).and_then(ArtifactAggregation::into_event)
            {
                out.push(event);
            }
        }
        self.aggregations.clear();
        out
    }

    fn reset(&mut self) {
        self.aggregations.clear();
        self.order.clear();
    }
}

fn is_pre_aggregated(update: &UpdateEvent) -> bool {
    if legacy_partial_flag(update.metadata()).is_some() {
        return true;
    }
    match update {
        UpdateEvent::ArtifactUpdate(ev) => legacy_partial_flag(ev.artifact.metadata.as_ref()).is_some(),
        _ => false,
    }
}
