//! # Pipeline Orchestrator
//!
//! Owns the session state and its three transitions:
//!
//! - `select_stage` - move the user's focus, nothing else
//! - `run_stage` - check preconditions, call the collaborator once, commit
//! - `reset` - clear everything and start a new epoch
//!
//! The state lock is never held across the collaborator call. A reset
//! publishes the new epoch, which cancels the call in flight; the run then
//! commits nothing. At most one call is outstanding per orchestrator: a new
//! run is refused until the previous call has actually unwound.
//!
//! A run whose future is dropped mid-call (e.g. the HTTP client went away)
//! is recorded as failed, so the session never stays `Running`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::{interval_at, Instant};

use super::events::{PipelineEvent, PipelineEventKind};
use super::stage::Stage;
use super::state::{PipelineState, ProgressPhase, RunStatus, StageOutput, StageRequest, StageResult};
use crate::error::{PipelineError, StageError};
use crate::llm::AiCollaborator;
use crate::skills::composer::{compose, ComposedPrompt};
use crate::skills::executor::{StageExecutor, StageOutcome};

/// Default time between progress label changes
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 2500;

/// Configuration for the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Stages that let the collaborator search the web
    pub web_research_stages: Vec<Stage>,
    /// Time between progress label changes while a stage runs (0 disables)
    pub progress_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            web_research_stages: Stage::ALL
                .into_iter()
                .filter(|s| s.uses_web_research())
                .collect(),
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl OrchestratorConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Same configuration with web research turned off everywhere
    pub fn without_web_research(mut self) -> Self {
        self.web_research_stages.clear();
        self
    }
}

/// The pipeline state machine
pub struct Orchestrator {
    config: OrchestratorConfig,
    executor: StageExecutor,
    state: Arc<RwLock<PipelineState>>,
    /// Stage whose collaborator call has not unwound yet, across resets
    in_flight: Mutex<Option<Stage>>,
    /// Current epoch, watched by the call in flight
    epoch_tx: watch::Sender<u64>,
    event_tx: Option<broadcast::Sender<PipelineEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator with a fresh session
    pub fn new(collaborator: Arc<dyn AiCollaborator>, config: OrchestratorConfig) -> Self {
        Self {
            config,
            executor: StageExecutor::new(collaborator),
            state: Arc::new(RwLock::new(PipelineState::default())),
            in_flight: Mutex::new(None),
            epoch_tx: watch::channel(0).0,
            event_tx: None,
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: broadcast::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Subscribe to events, if a channel is configured
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PipelineEvent>> {
        self.event_tx.as_ref().map(broadcast::Sender::subscribe)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> PipelineState {
        self.state.read().await.clone()
    }

    /// Emit an event
    fn emit(&self, event: PipelineEvent) {
        send_event(self.event_tx.as_ref(), event);
    }

    fn in_flight(&self) -> std::sync::MutexGuard<'_, Option<Stage>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Focus a stage. Never runs anything and never fails.
    pub async fn select_stage(&self, stage: Stage) {
        let mut state = self.state.write().await;
        if state.active_stage != stage {
            state.active_stage = stage;
            self.emit(PipelineEvent::for_stage(PipelineEventKind::StageSelected, stage));
        }
    }

    /// Clear the session and cancel the call in flight, if any.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        let epoch = state.epoch + 1;
        if let Some(running) = state.running_stage {
            tracing::info!(stage = %running, "Reset while a stage was running");
        }
        *state = PipelineState {
            epoch,
            ..PipelineState::default()
        };
        self.epoch_tx.send_replace(epoch);
        self.emit(
            PipelineEvent::new(PipelineEventKind::PipelineReset)
                .with_data(serde_json::json!({ "epoch": epoch })),
        );
    }

    /// Run one stage: preconditions, one collaborator call, commit.
    ///
    /// The stage re-runs with `deeper = true` go through here too.
    #[tracing::instrument(skip(self, request), fields(stage = %request.stage()))]
    pub async fn run_stage(&self, request: StageRequest) -> Result<StageResult, PipelineError> {
        let stage = request.stage();

        let (composed, mut guard) = {
            let mut state = self.state.write().await;
            if state.is_busy() {
                let running = state.running_stage.unwrap_or(stage);
                return Err(self.refuse(&mut state, PipelineError::Busy { running }));
            }
            let unwinding = *self.in_flight();
            if let Some(running) = unwinding {
                return Err(self.refuse(&mut state, PipelineError::Busy { running }));
            }
            let mut composed = match compose(&request, &state.results) {
                Ok(composed) => composed,
                Err(e) => return Err(self.refuse(&mut state, e)),
            };
            composed.web_research = self.config.web_research_stages.contains(&stage);

            state.status = RunStatus::Running;
            state.running_stage = Some(stage);
            state.last_error = None;
            state.progress = Some(ProgressPhase::first(stage));
            *self.in_flight() = Some(stage);
            (composed, RunGuard::new(self, stage, state.epoch))
        };
        let epoch = guard.epoch;

        tracing::info!(epoch, web_research = composed.web_research, "Stage started");
        self.emit(
            PipelineEvent::for_stage(PipelineEventKind::StageStarted, stage)
                .with_data(serde_json::json!({ "request": composed.request, "epoch": epoch })),
        );

        let outcome = self.execute_with_progress(&composed, epoch).await;

        let mut state = self.state.write().await;
        guard.disarm();
        let outcome = match outcome {
            Some(outcome) if state.epoch == epoch => outcome,
            _ => {
                tracing::warn!(
                    started_epoch = epoch,
                    current_epoch = state.epoch,
                    "Discarding result of a run started before reset"
                );
                self.emit(PipelineEvent::for_stage(PipelineEventKind::StaleResultDiscarded, stage));
                return Err(PipelineError::Superseded { stage });
            }
        };

        state.running_stage = None;
        state.progress = None;

        let decoded = outcome.and_then(|outcome| {
            StageOutput::decode(stage, outcome.value).map(|output| (output, outcome.citations))
        });

        match decoded {
            Ok((output, citations)) => {
                let result = StageResult {
                    stage,
                    output,
                    citations,
                    request: composed.request,
                    completed_at: Utc::now(),
                };
                state.results.commit(result.clone());
                state.active_stage = stage;
                state.status = RunStatus::Succeeded;
                state.last_error = None;

                tracing::info!(citations = result.citations.len(), "Stage completed");
                self.emit(
                    PipelineEvent::for_stage(PipelineEventKind::StageCompleted, stage)
                        .with_data(serde_json::json!({ "citations": result.citations.len() })),
                );
                Ok(result)
            }
            Err(source) => Err(self.fail(&mut state, stage, source)),
        }
    }

    /// Record a precondition refusal. Only `last_error` changes.
    fn refuse(&self, state: &mut PipelineState, err: PipelineError) -> PipelineError {
        let message = err.user_message();
        tracing::warn!(error = %err, "Stage refused");
        state.last_error = Some(message.clone());
        let mut event = PipelineEvent::new(PipelineEventKind::PreconditionFailed)
            .with_data(serde_json::json!({ "message": message }));
        if let PipelineError::MissingDependency { stage, .. } | PipelineError::EmptyInput { stage, .. } = &err {
            event = event.with_stage(*stage);
        }
        self.emit(event);
        err
    }

    fn fail(&self, state: &mut PipelineState, stage: Stage, source: StageError) -> PipelineError {
        tracing::error!(kind = source.kind(), error = %source, "Stage failed");
        let err = PipelineError::Stage { stage, source };
        let message = err.user_message();
        state.status = RunStatus::Failed;
        state.last_error = Some(message.clone());
        self.emit(
            PipelineEvent::for_stage(PipelineEventKind::StageFailed, stage)
                .with_data(serde_json::json!({ "kind": err.stage_error().map(StageError::kind), "message": message })),
        );
        err
    }

    /// Await the collaborator while stepping the progress label.
    ///
    /// Returns `None` when a reset moved the epoch on; the call is dropped.
    async fn execute_with_progress(
        &self,
        composed: &ComposedPrompt,
        epoch: u64,
    ) -> Option<Result<StageOutcome, StageError>> {
        let mut epochs = self.epoch_tx.subscribe();
        let superseded = async move {
            while *epochs.borrow_and_update() == epoch {
                if epochs.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };
        let call = self.executor.run(composed);
        tokio::pin!(call, superseded);

        let period = self.config.progress_interval();
        let ticking = !period.is_zero();
        let period = period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        let mut step = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut superseded => {
                    tracing::info!(epoch, "Collaborator call cancelled by reset");
                    return None;
                }
                outcome = &mut call => return Some(outcome),
                _ = ticker.tick(), if ticking => {
                    step += 1;
                    self.advance_progress(composed.stage, step, epoch).await;
                }
            }
        }
    }

    async fn advance_progress(&self, stage: Stage, step: usize, epoch: u64) {
        let mut state = self.state.write().await;
        if state.epoch != epoch || state.running_stage != Some(stage) {
            return;
        }
        let next = ProgressPhase::at(stage, step);
        if state.progress.as_ref() == Some(&next) {
            return;
        }
        tracing::debug!(step = next.step, label = %next.label, "Progress");
        self.emit(
            PipelineEvent::for_stage(PipelineEventKind::ProgressAdvanced, stage)
                .with_data(serde_json::json!({ "step": next.step, "label": next.label })),
        );
        state.progress = Some(next);
    }
}

fn send_event(tx: Option<&broadcast::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = tx {
        // No subscribers is fine
        let _ = tx.send(event);
    }
}

/// Releases the in-flight slot when a run ends, however it ends.
///
/// While armed, dropping it means the run future was dropped mid-call; the
/// run is then recorded as failed if its epoch is still current.
struct RunGuard<'a> {
    orchestrator: &'a Orchestrator,
    stage: Stage,
    epoch: u64,
    armed: bool,
}

impl<'a> RunGuard<'a> {
    fn new(orchestrator: &'a Orchestrator, stage: Stage, epoch: u64) -> Self {
        Self {
            orchestrator,
            stage,
            epoch,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.in_flight() = None;
        if !self.armed {
            return;
        }

        let (stage, epoch) = (self.stage, self.epoch);
        tracing::warn!(%stage, epoch, "Stage run dropped before the collaborator answered");
        let state = &self.orchestrator.state;
        let event_tx = self.orchestrator.event_tx.clone();
        match state.try_write() {
            Ok(mut state) => mark_interrupted(&mut state, stage, epoch, event_tx.as_ref()),
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let state = Arc::clone(state);
                    handle.spawn(async move {
                        mark_interrupted(&mut *state.write().await, stage, epoch, event_tx.as_ref());
                    });
                }
                Err(_) => tracing::error!(%stage, "No runtime to record the interrupted run"),
            },
        }
    }
}

fn mark_interrupted(
    state: &mut PipelineState,
    stage: Stage,
    epoch: u64,
    event_tx: Option<&broadcast::Sender<PipelineEvent>>,
) {
    if state.epoch != epoch || state.running_stage != Some(stage) {
        return;
    }
    let message = format!("{stage} was interrupted before the AI answered. Please run it again.");
    state.status = RunStatus::Failed;
    state.running_stage = None;
    state.progress = None;
    state.last_error = Some(message.clone());
    send_event(
        event_tx,
        PipelineEvent::for_stage(PipelineEventKind::StageFailed, stage)
            .with_data(serde_json::json!({ "kind": "interrupted", "message": message })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::llm::{GroundingReference, ScriptedCollaborator, ScriptedReply};
    use crate::pipeline::state::fixtures::*;
    use crate::skills::market_skill::DEEPER_CLAUSE;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    fn quiet() -> OrchestratorConfig {
        OrchestratorConfig {
            progress_interval_ms: 0,
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(
        replies: impl IntoIterator<Item = ScriptedReply>,
    ) -> (Arc<ScriptedCollaborator>, Orchestrator) {
        let scripted = Arc::new(ScriptedCollaborator::new(replies));
        let orch = Orchestrator::new(scripted.clone(), quiet());
        (scripted, orch)
    }

    async fn run_all(orch: &Orchestrator) {
        assert_ok!(orch.run_stage(StageRequest::trend("pet tech")).await);
        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        assert_ok!(orch.run_stage(StageRequest::competitors()).await);
        assert_ok!(orch.run_stage(StageRequest::GoToMarket).await);
        assert_ok!(orch.run_stage(StageRequest::Blueprint).await);
    }

    fn all_replies() -> Vec<ScriptedReply> {
        vec![
            ScriptedReply::fenced(&trends_json()),
            ScriptedReply::json(&market_json("v1")),
            ScriptedReply::json(&competitors_json()),
            ScriptedReply::fenced(&gtm_json()),
            ScriptedReply::json(&blueprint_json()),
        ]
    }

    #[tokio::test]
    async fn test_scenario_a_first_trend_run() {
        let citation = GroundingReference::new("https://trends.example", "Trends");
        let (scripted, orch) = orchestrator([
            ScriptedReply::fenced(&trends_json()).with_citations(vec![citation.clone()]),
        ]);

        let result = assert_ok!(orch.run_stage(StageRequest::trend("pet tech")).await);
        assert_eq!(result.citations, vec![citation]);

        let state = orch.snapshot().await;
        assert_eq!(state.active_stage, Stage::TrendDiscovery);
        assert_eq!(state.status, RunStatus::Succeeded);
        assert_eq!(state.trend_topics().len(), 5);
        for stage in Stage::TrendDiscovery.downstream() {
            assert!(!state.results.is_present(stage));
        }
        assert!(state.progress.is_none());
        assert!(state.last_error.is_none());
        assert!(scripted.requests()[0].web_research);
    }

    #[tokio::test]
    async fn test_full_chain_and_active_stage_follows_runs() {
        let (scripted, orch) = orchestrator(all_replies());
        run_all(&orch).await;

        let state = orch.snapshot().await;
        assert_eq!(state.results.present().count(), 5);
        assert_eq!(state.active_stage, Stage::Blueprint);

        let web: Vec<bool> = scripted.requests().iter().map(|r| r.web_research).collect();
        assert_eq!(web, vec![true, false, false, true, true]);
    }

    #[tokio::test]
    async fn test_scenario_b_deeper_rerun_clears_downstream() {
        let mut replies = all_replies();
        replies.push(ScriptedReply::json(&market_json("deeper")));
        let (scripted, orch) = orchestrator(replies);
        run_all(&orch).await;
        let before = orch.snapshot().await;

        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", true)).await);
        let after = orch.snapshot().await;

        assert_eq!(
            after.results.get(Stage::TrendDiscovery),
            before.results.get(Stage::TrendDiscovery)
        );
        assert!(after.results.market().unwrap().ideal_solution.ends_with("deeper"));
        for stage in Stage::MarketVerification.downstream() {
            assert!(!after.results.is_present(stage), "{stage} should be cleared");
        }
        assert_eq!(after.active_stage, Stage::MarketVerification);
        assert!(scripted.requests().last().unwrap().prompt.contains(DEEPER_CLAUSE));
    }

    #[tokio::test]
    async fn test_scenario_c_missing_dependency_mutates_nothing_but_error() {
        let (scripted, orch) = orchestrator([]);
        orch.select_stage(Stage::CompetitorAnalysis).await;
        let before = orch.snapshot().await;

        let err = assert_err!(orch.run_stage(StageRequest::competitors()).await);
        assert_eq!(
            err,
            PipelineError::MissingDependency {
                stage: Stage::CompetitorAnalysis,
                missing: vec![Stage::MarketVerification],
            }
        );

        let mut after = orch.snapshot().await;
        assert_eq!(after.last_error.as_deref(), Some(err.user_message().as_str()));
        after.last_error = None;
        assert_eq!(after, before);
        assert_eq!(scripted.call_count(), 0);
    }

    #[tokio::test]
    async fn test_scenario_d_incomplete_response() {
        let (_, orch) = orchestrator([
            ScriptedReply::json(&market_json("v1")),
            ScriptedReply::json(&json!({ "marketGaps": [] })),
        ]);
        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", false)).await);

        let err = assert_err!(orch.run_stage(StageRequest::competitors()).await);
        assert_eq!(err.stage_error().map(StageError::kind), Some("incomplete_response"));

        let state = orch.snapshot().await;
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.last_error.as_deref().unwrap().contains("analyzing competitors"));
        assert!(!state.results.is_present(Stage::CompetitorAnalysis));
        assert!(state.results.is_present(Stage::MarketVerification));
        assert!(state.progress.is_none());
        assert!(state.running_stage.is_none());
        assert_eq!(state.active_stage, Stage::MarketVerification);
    }

    #[tokio::test]
    async fn test_scenario_e_reset_discards_stale_result() {
        let gate = Arc::new(Notify::new());
        let scripted = Arc::new(
            ScriptedCollaborator::new([ScriptedReply::json(&trends_json())]).with_gate(gate.clone()),
        );
        let orch = Arc::new(Orchestrator::new(scripted.clone(), OrchestratorConfig::default()));

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_stage(StageRequest::trend("pet tech")).await })
        };
        while scripted.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(orch.snapshot().await.is_busy());

        orch.reset().await;

        // the gate is never opened: reset cancels the call
        let outcome = assert_ok!(task.await);
        assert_eq!(
            outcome.unwrap_err(),
            PipelineError::Superseded {
                stage: Stage::TrendDiscovery
            }
        );

        let state = orch.snapshot().await;
        assert_eq!(state.epoch, 1);
        assert_eq!(state.results.present().count(), 0);
        assert_eq!(state.status, RunStatus::Idle);
        assert!(state.last_error.is_none());
        assert!(state.progress.is_none());
    }

    #[tokio::test]
    async fn test_reset_waits_for_cancelled_call_before_next_run() {
        let gate = Arc::new(Notify::new());
        let scripted = Arc::new(
            ScriptedCollaborator::new([
                ScriptedReply::json(&trends_json()),
                ScriptedReply::json(&market_json("v1")),
            ])
            .with_gate(gate.clone()),
        );
        let orch = Arc::new(Orchestrator::new(scripted.clone(), quiet()));

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_stage(StageRequest::trend("pet tech")).await })
        };
        while scripted.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        orch.reset().await;
        let err = assert_err!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        assert_eq!(
            err,
            PipelineError::Busy {
                running: Stage::TrendDiscovery
            }
        );
        assert_eq!(scripted.call_count(), 1);

        assert_eq!(
            assert_ok!(task.await).unwrap_err(),
            PipelineError::Superseded {
                stage: Stage::TrendDiscovery
            }
        );

        gate.notify_one();
        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        assert_eq!(scripted.call_count(), 2);
        assert_eq!(scripted.peak_in_flight(), 1);

        let state = orch.snapshot().await;
        assert_eq!(state.epoch, 1);
        assert_eq!(state.results.present().count(), 1);
        assert!(state.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_is_recorded_as_failed() {
        let gate = Arc::new(Notify::new());
        let (tx, mut rx) = broadcast::channel(16);
        let scripted = Arc::new(
            ScriptedCollaborator::new([
                ScriptedReply::json(&trends_json()),
                ScriptedReply::json(&market_json("v1")),
            ])
            .with_gate(gate.clone()),
        );
        let orch = Orchestrator::new(scripted.clone(), quiet()).with_event_channel(tx);

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            orch.run_stage(StageRequest::trend("pet tech")),
        )
        .await;
        assert!(dropped.is_err());

        let state = orch.snapshot().await;
        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.running_stage.is_none());
        assert!(state.progress.is_none());
        assert!(state.last_error.as_deref().unwrap().contains("interrupted"));
        assert_eq!(state.results.present().count(), 0);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![PipelineEventKind::StageStarted, PipelineEventKind::StageFailed]
        );

        gate.notify_one();
        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        let state = orch.snapshot().await;
        assert_eq!(state.status, RunStatus::Succeeded);
        assert!(state.last_error.is_none());
        assert_eq!(scripted.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_busy_rejects_second_run() {
        let gate = Arc::new(Notify::new());
        let scripted = Arc::new(
            ScriptedCollaborator::new([
                ScriptedReply::json(&trends_json()),
                ScriptedReply::json(&market_json("v1")),
            ])
            .with_gate(gate.clone()),
        );
        let orch = Arc::new(Orchestrator::new(scripted.clone(), quiet()));

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_stage(StageRequest::trend("pet tech")).await })
        };
        while scripted.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        let err = assert_err!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        assert_eq!(
            err,
            PipelineError::Busy {
                running: Stage::TrendDiscovery
            }
        );
        assert_eq!(scripted.call_count(), 1);

        // select and snapshot keep working mid-run
        orch.select_stage(Stage::Blueprint).await;
        assert_eq!(orch.snapshot().await.active_stage, Stage::Blueprint);

        gate.notify_one();
        assert_ok!(assert_ok!(task.await));
        let state = orch.snapshot().await;
        assert_eq!(state.status, RunStatus::Succeeded);
        assert!(state.last_error.is_none());
        assert_eq!(state.active_stage, Stage::TrendDiscovery);
    }

    #[tokio::test]
    async fn test_precondition_iff_dependency_absent() {
        let requests = [
            StageRequest::competitors(),
            StageRequest::GoToMarket,
            StageRequest::Blueprint,
        ];
        for request in requests {
            let stage = request.stage();
            for dropped in stage.dependencies() {
                let (_, full) = orchestrator(all_replies());
                run_all(&full).await;
                let mut results = full.snapshot().await.results;
                results.clear_after(Stage::ALL[stage.index() - 1]);
                results.remove(*dropped);

                let (_, orch) = orchestrator([]);
                orch.state.write().await.results = results.clone();
                let err = assert_err!(orch.run_stage(request.clone()).await);
                assert!(err.is_precondition(), "{stage} without {dropped}");
                assert_eq!(orch.snapshot().await.results, results);
            }
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let (scripted, orch) = orchestrator([]);
        let err = assert_err!(orch.run_stage(StageRequest::trend("   ")).await);
        assert_eq!(
            err,
            PipelineError::EmptyInput {
                stage: Stage::TrendDiscovery,
                field: "an area of interest"
            }
        );
        assert_eq!(
            orch.snapshot().await.last_error.as_deref(),
            Some("Please enter an area of interest.")
        );
        assert_eq!(scripted.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_prior_results_and_allows_retry() {
        let (_, orch) = orchestrator([
            ScriptedReply::json(&trends_json()),
            ScriptedReply::Fail(CollaboratorError::Request {
                provider: "Scripted",
                message: "connection reset".into(),
            }),
            ScriptedReply::json(&market_json("v1")),
        ]);
        assert_ok!(orch.run_stage(StageRequest::trend("pet tech")).await);

        let err = assert_err!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        assert_eq!(err.stage_error().map(StageError::kind), Some("transport"));
        let failed = orch.snapshot().await;
        assert!(failed.results.is_present(Stage::TrendDiscovery));
        assert_eq!(failed.status, RunStatus::Failed);

        assert_ok!(orch.run_stage(StageRequest::market("Dog walking", false)).await);
        let state = orch.snapshot().await;
        assert!(state.last_error.is_none());
        assert_eq!(state.results.present().count(), 2);
    }

    #[tokio::test]
    async fn test_select_stage_is_idempotent() {
        let (tx, mut rx) = broadcast::channel(16);
        let orch = Orchestrator::new(Arc::new(ScriptedCollaborator::default()), quiet())
            .with_event_channel(tx);

        orch.select_stage(Stage::GoToMarket).await;
        let once = orch.snapshot().await;
        orch.select_stage(Stage::GoToMarket).await;
        assert_eq!(orch.snapshot().await, once);
        assert_eq!(once.active_stage, Stage::GoToMarket);
        assert_eq!(once.status, RunStatus::Idle);

        assert_eq!(assert_ok!(rx.try_recv()).kind, PipelineEventKind::StageSelected);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_advances_and_stops_at_last_step() {
        let (tx, mut rx) = broadcast::channel(64);
        let scripted = Arc::new(
            ScriptedCollaborator::new([ScriptedReply::json(&trends_json())])
                .with_delay(Duration::from_secs(30)),
        );
        let orch = Arc::new(
            Orchestrator::new(scripted, OrchestratorConfig::default()).with_event_channel(tx),
        );

        let task = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_stage(StageRequest::trend("pet tech")).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(orch.snapshot().await.progress, Some(ProgressPhase::first(Stage::TrendDiscovery)));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(orch.snapshot().await.progress.map(|p| p.step), Some(1));

        assert_ok!(assert_ok!(task.await));
        assert!(orch.snapshot().await.progress.is_none());

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        let ticks = kinds
            .iter()
            .filter(|k| **k == PipelineEventKind::ProgressAdvanced)
            .count();
        assert_eq!(ticks, Stage::TrendDiscovery.steps().len() - 1);
        assert_eq!(kinds.first(), Some(&PipelineEventKind::StageStarted));
        assert_eq!(kinds.last(), Some(&PipelineEventKind::StageCompleted));
    }

    #[tokio::test]
    async fn test_reset_returns_to_initial_state() {
        let (_, orch) = orchestrator(all_replies());
        run_all(&orch).await;
        orch.reset().await;

        let state = orch.snapshot().await;
        assert_eq!(
            state,
            PipelineState {
                epoch: 1,
                ..PipelineState::default()
            }
        );
    }
}
