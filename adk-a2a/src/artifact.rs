//! Artifact identity and chunk flags for outgoing events.
//!
//! An [`ArtifactMaker`] sees every agent event of one task execution, in
//! order, and decides which artifact the event's parts belong to and how the
//! receiver should combine them (`append` / `last_chunk`).

use crate::metadata::KEY_PARTIAL;
use crate::types::{self as a2a, Artifact, TaskArtifactUpdateEvent};
use adk_core::Event;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub trait ArtifactMaker: Send {
    /// Produce the update for one event, or `None` when there is nothing to emit.
    fn transform(
        &mut self,
        event: &Event,
        parts: Vec<a2a::Part>,
        metadata: Map<String, Value>,
    ) -> Option<TaskArtifactUpdateEvent>;

    /// Trailing update to send once the agent stream is exhausted.
    fn finalize(&mut self) -> Option<TaskArtifactUpdateEvent>;
}

/// How agent events map onto artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One chunked artifact stream per event author.
    #[default]
    ArtifactPerAuthor,
    /// One rolling artifact for final events plus one ephemeral artifact for
    /// partial events, every update stamped with `adk_partial`.
    Legacy,
}

impl OutputMode {
    pub fn artifact_maker(
        self,
        task_id: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Box<dyn ArtifactMaker> {
        let task = TaskRef { task_id: task_id.into(), context_id: context_id.into() };
        match self {
            OutputMode::ArtifactPerAuthor => Box::new(PerAuthorArtifacts::new(task)),
            OutputMode::Legacy => Box::new(LegacyArtifacts::new(task)),
        }
    }
}

#[derive(Debug, Clone)]
struct TaskRef {
    task_id: String,
    context_id: String,
}

impl TaskRef {
    fn update(
        &self,
        artifact_id: String,
        parts: Vec<a2a::Part>,
        metadata: Map<String, Value>,
        append: bool,
        last_chunk: bool,
    ) -> TaskArtifactUpdateEvent {
        let mut artifact = Artifact::new(artifact_id, parts);
        artifact.metadata = Some(metadata);
        TaskArtifactUpdateEvent {
            task_id: self.task_id.clone(),
            context_id: self.context_id.clone(),
            artifact,
            append,
            last_chunk,
            metadata: None,
        }
    }
}

fn new_artifact_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Each author owns at most one open artifact. Partial events extend it; the
/// next non-partial event closes it, replacing the streamed chunks with the
/// complete content.
pub struct PerAuthorArtifacts {
    task: TaskRef,
    open: HashMap<String, String>,
}

impl PerAuthorArtifacts {
    fn new(task: TaskRef) -> Self {
        Self { task, open: HashMap::new() }
    }
}

impl ArtifactMaker for PerAuthorArtifacts {
    fn transform(
        &mut self,
        event: &Event,
        parts: Vec<a2a::Part>,
        metadata: Map<String, Value>,
    ) -> Option<TaskArtifactUpdateEvent> {
        if event.is_partial() {
            if parts.is_empty() {
                return None;
            }
            let (artifact_id, append) = match self.open.get(&event.author) {
                Some(id) => (id.clone(), true),
                None => {
                    let id = new_artifact_id();
                    self.open.insert(event.author.clone(), id.clone());
                    (id, false)
                }
            };
            return Some(self.task.update(artifact_id, parts, metadata, append, false));
        }

        match (self.open.remove(&event.author), parts.is_empty()) {
            // Close the stream without discarding what was streamed.
            (Some(id), true) => Some(self.task.update(id, parts, metadata, true, true)),
            (Some(id), false) => Some(self.task.update(id, parts, metadata, false, true)),
            (None, true) => None,
            (None, false) => Some(self.task.update(new_artifact_id(), parts, metadata, false, true)),
        }
    }

    fn finalize(&mut self) -> Option<TaskArtifactUpdateEvent> {
        None
    }
}

pub struct LegacyArtifacts {
    task: TaskRef,
    main_id: Option<String>,
    partial_id: Option<String>,
}

impl LegacyArtifacts {
    fn new(task: TaskRef) -> Self {
        Self { task, main_id: None, partial_id: None }
    }
}

impl ArtifactMaker for LegacyArtifacts {
    fn transform(
        &mut self,
        event: &Event,
        parts: Vec<a2a::Part>,
        mut metadata: Map<String, Value>,
    ) -> Option<TaskArtifactUpdateEvent> {
        if parts.is_empty() {
            return None;
        }
        let partial = event.is_partial();
        metadata.insert(KEY_PARTIAL.to_string(), Value::Bool(partial));

        if partial {
            let id = self.partial_id.get_or_insert_with(new_artifact_id).clone();
            Some(self.task.update(id, parts, metadata, false, false))
        } else {
            let append = self.main_id.is_some();
            let id = self.main_id.get_or_insert_with(new_artifact_id).clone();
            Some(self.task.update(id, parts, metadata, append, false))
        }
    }

    /// Resets the ephemeral partial artifact, only if one was ever used.
    fn finalize(&mut self) -> Option<TaskArtifactUpdateEvent> {
        let id = self.partial_id.take()?;
        let mut metadata = Map::new();
        metadata.insert(KEY_PARTIAL.to_string(), Value::Bool(true));
        Some(self.task.update(id, vec![a2a::Part::data(Map::new())], metadata, false, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adk_core::{Content, LlmResponse};

    fn event(author: &str, text: &str, partial: bool) -> Event {
        let mut event = Event::new("inv").with_author(author);
        let content = Content::new("model").with_text(text);
        event.llm_response =
            if partial { LlmResponse::partial(content) } else { LlmResponse::new(content) };
        event
    }

    fn emit(maker: &mut dyn ArtifactMaker, ev: &Event) -> Option<TaskArtifactUpdateEvent> {
        let parts: Vec<a2a::Part> = ev
            .content()
            .map(|c| c.parts.iter().filter_map(|p| p.text()).map(a2a::Part::text).collect())
            .unwrap_or_default();
        maker.transform(ev, parts, Map::new())
    }

    #[test]
    fn test_per_author_chunk_flags() {
        let mut maker = OutputMode::ArtifactPerAuthor.artifact_maker("t", "c");
        let p1 = emit(maker.as_mut(), &event("bot", "Hel", true)).unwrap();
        let p2 = emit(maker.as_mut(), &event("bot", "lo", true)).unwrap();
        let f = emit(maker.as_mut(), &event("bot", "Hello", false)).unwrap();

        assert_eq!((p1.append, p1.last_chunk), (false, false));
        assert_eq!((p2.append, p2.last_chunk), (true, false));
        assert_eq!((f.append, f.last_chunk), (false, true));
        assert_eq!(p1.artifact.artifact_id, p2.artifact.artifact_id);
        assert_eq!(p1.artifact.artifact_id, f.artifact.artifact_id);
        assert!(maker.finalize().is_none());
    }

    #[test]
    fn test_per_author_new_stream_after_close() {
        let mut maker = OutputMode::ArtifactPerAuthor.artifact_maker("t", "c");
        let first = emit(maker.as_mut(), &event("bot", "one", false)).unwrap();
        let next = emit(maker.as_mut(), &event("bot", "tw", true)).unwrap();
        assert_ne!(first.artifact.artifact_id, next.artifact.artifact_id);
        assert!(!next.append);
    }

    #[test]
    fn test_authors_have_separate_streams() {
        let mut maker = OutputMode::ArtifactPerAuthor.artifact_maker("t", "c");
        let a = emit(maker.as_mut(), &event("a", "x", true)).unwrap();
        let b = emit(maker.as_mut(), &event("b", "y", true)).unwrap();
        let a2 = emit(maker.as_mut(), &event("a", "z", true)).unwrap();
        assert_ne!(a.artifact.artifact_id, b.artifact.artifact_id);
        assert_eq!(a.artifact.artifact_id, a2.artifact.artifact_id);
        assert!(!b.append);
        assert!(a2.append);
    }

    #[test]
    fn test_empty_final_closes_open_stream() {
        let mut maker = OutputMode::ArtifactPerAuthor.artifact_maker("t", "c");
        let p = emit(maker.as_mut(), &event("bot", "x", true)).unwrap();

        let mut usage_only = Event::new("inv").with_author("bot");
        usage_only.llm_response.turn_complete = true;
        let close = maker.transform(&usage_only, vec![], Map::new()).unwrap();
        assert_eq!(close.artifact.artifact_id, p.artifact.artifact_id);
        assert!(close.append && close.last_chunk);
        assert!(close.artifact.parts.is_empty());

        assert!(maker.transform(&usage_only, vec![], Map::new()).is_none());
    }

    #[test]
    fn test_legacy_ids_and_flags() {
        let mut maker = OutputMode::Legacy.artifact_maker("t", "c");
        let p1 = emit(maker.as_mut(), &event("bot", "He", true)).unwrap();
        let p2 = emit(maker.as_mut(), &event("bot", "Hel", true)).unwrap();
        let f1 = emit(maker.as_mut(), &event("bot", "Hello", false)).unwrap();
        let f2 = emit(maker.as_mut(), &event("other", "Bye", false)).unwrap();

        assert_eq!(p1.artifact.artifact_id, p2.artifact.artifact_id);
        assert_ne!(p1.artifact.artifact_id, f1.artifact.artifact_id);
        assert_eq!(f1.artifact.artifact_id, f2.artifact.artifact_id);
        assert!(!f1.append);
        assert!(f2.append);

        let partial_flag = |u: &TaskArtifactUpdateEvent| {
            u.artifact.metadata.as_ref().unwrap()[KEY_PARTIAL].as_bool().unwrap()
        };
        assert!(partial_flag(&p1));
        assert!(!partial_flag(&f1));

        let reset = maker.finalize().unwrap();
        assert_eq!(reset.artifact.artifact_id, p1.artifact.artifact_id);
        assert!(reset.last_chunk && !reset.append);
        assert!(partial_flag(&reset));
        assert!(maker.finalize().is_none());
    }

    #[test]
    fn test_legacy_finalize_noop_without_partials() {
        let mut maker = OutputMode::Legacy.artifact_maker("t", "c");
        emit(maker.as_mut(), &event("bot", "done", false)).unwrap();
        assert!(maker.finalize().is_none());
    }
}
