//! Scripted collaborator: answers from a queue of canned replies.
//!
//! Every request is recorded so tests can inspect the composed prompts.
//! An optional gate holds each reply until released, which lets a test
//! act on the pipeline while a call is in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{AiCollaborator, CollaboratorRequest, CollaboratorResponse, GroundingReference};
use crate::error::CollaboratorError;

/// A canned outcome for one call
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Answer(CollaboratorResponse),
    Fail(CollaboratorError),
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedReply::Answer(CollaboratorResponse::text(text))
    }

    /// Reply with the JSON wrapped in a ```json fence
    pub fn fenced(json: &serde_json::Value) -> Self {
        Self::text(format!("```json\n{}\n```", json))
    }

    pub fn json(json: &serde_json::Value) -> Self {
        Self::text(json.to_string())
    }

    pub fn with_citations(self, citations: Vec<GroundingReference>) -> Self {
        match self {
            ScriptedReply::Answer(mut answer) => {
                answer.citations = citations;
                ScriptedReply::Answer(answer)
            }
            fail => fail,
        }
    }
}

#[derive(Default)]
pub struct ScriptedCollaborator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<CollaboratorRequest>>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl ScriptedCollaborator {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every reply until the gate is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<CollaboratorRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Most calls that were ever outstanding at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

/// Counts a call as outstanding until it returns or is dropped
struct ActiveCall<'a>(&'a AtomicUsize);

impl<'a> ActiveCall<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AiCollaborator for ScriptedCollaborator {
    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn generate(
        &self,
        request: CollaboratorRequest,
    ) -> Result<CollaboratorResponse, CollaboratorError> {
        let _active = ActiveCall::enter(&self.active, &self.peak_active);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match reply {
            Some(ScriptedReply::Answer(answer)) => Ok(answer),
            Some(ScriptedReply::Fail(err)) => Err(err),
            None => Err(CollaboratorError::Exhausted),
        }
    }
}
