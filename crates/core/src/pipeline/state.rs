//! # Pipeline State
//!
//! The in-memory session: one optional result per stage, which stage the
//! user is looking at, and the status of the current or last run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stage::{Stage, STAGE_COUNT};
use crate::error::StageError;
use crate::llm::GroundingReference;
use crate::skills::blueprint_skill::SolutionBlueprint;
use crate::skills::competitor_skill::{CompetitorAnalysis, CompletenessBar};
use crate::skills::gtm_skill::GoToMarketStrategy;
use crate::skills::keywords::{keyword_cloud, Keyword};
use crate::skills::market_skill::MarketAnalysis;
use crate::skills::trend_skill::TrendDiscovery;

/// User inputs for one run, tagged by stage
///
/// ```json
/// { "stage": "market_verification", "industry": "Pet tech", "deeper": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageRequest {
    TrendDiscovery {
        area_of_interest: String,
    },
    MarketVerification {
        industry: String,
        #[serde(default)]
        deeper: bool,
    },
    /// Both inputs default from the market stage when omitted
    CompetitorAnalysis {
        #[serde(default)]
        industry: Option<String>,
        #[serde(default)]
        problem: Option<String>,
    },
    GoToMarket,
    Blueprint,
}

impl StageRequest {
    pub fn stage(&self) -> Stage {
        match self {
            StageRequest::TrendDiscovery { .. } => Stage::TrendDiscovery,
            StageRequest::MarketVerification { .. } => Stage::MarketVerification,
            StageRequest::CompetitorAnalysis { .. } => Stage::CompetitorAnalysis,
            StageRequest::GoToMarket => Stage::GoToMarket,
            StageRequest::Blueprint => Stage::Blueprint,
        }
    }

    pub fn trend(area_of_interest: impl Into<String>) -> Self {
        StageRequest::TrendDiscovery {
            area_of_interest: area_of_interest.into(),
        }
    }

    pub fn market(industry: impl Into<String>, deeper: bool) -> Self {
        StageRequest::MarketVerification {
            industry: industry.into(),
            deeper,
        }
    }

    /// Competitor request that takes both inputs from the market stage
    pub fn competitors() -> Self {
        StageRequest::CompetitorAnalysis {
            industry: None,
            problem: None,
        }
    }
}

/// Typed, validated output of a stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageOutput {
    TrendDiscovery(TrendDiscovery),
    MarketVerification(MarketAnalysis),
    CompetitorAnalysis(CompetitorAnalysis),
    GoToMarket(GoToMarketStrategy),
    Blueprint(SolutionBlueprint),
}

impl StageOutput {
    /// Decode a validated JSON value into the stage's output type
    pub fn decode(stage: Stage, value: Value) -> Result<Self, StageError> {
        fn typed<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StageError> {
            serde_json::from_value(value).map_err(|e| StageError::MalformedResponse(e.to_string()))
        }
        Ok(match stage {
            Stage::TrendDiscovery => StageOutput::TrendDiscovery(typed(value)?),
            Stage::MarketVerification => StageOutput::MarketVerification(typed(value)?),
            Stage::CompetitorAnalysis => StageOutput::CompetitorAnalysis(typed(value)?),
            Stage::GoToMarket => StageOutput::GoToMarket(typed(value)?),
            Stage::Blueprint => StageOutput::Blueprint(typed(value)?),
        })
    }

    pub fn stage(&self) -> Stage {
        match self {
            StageOutput::TrendDiscovery(_) => Stage::TrendDiscovery,
            StageOutput::MarketVerification(_) => Stage::MarketVerification,
            StageOutput::CompetitorAnalysis(_) => Stage::CompetitorAnalysis,
            StageOutput::GoToMarket(_) => Stage::GoToMarket,
            StageOutput::Blueprint(_) => Stage::Blueprint,
        }
    }

    /// Full JSON document, as sent to later stages
    pub fn to_json_pretty(&self) -> Result<String, StageError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            StageError::MalformedResponse(format!("cannot serialize {} result: {e}", self.stage()))
        })
    }
}

/// Immutable record of one successful stage run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub output: StageOutput,
    /// Web sources, in the order the collaborator returned them
    pub citations: Vec<GroundingReference>,
    /// The resolved inputs that produced this result
    pub request: StageRequest,
    pub completed_at: DateTime<Utc>,
}

/// One slot per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StageResults([Option<StageResult>; STAGE_COUNT]);

impl StageResults {
    pub fn get(&self, stage: Stage) -> Option<&StageResult> {
        self.0[stage.index()].as_ref()
    }

    pub fn is_present(&self, stage: Stage) -> bool {
        self.get(stage).is_some()
    }

    /// Store a result and drop everything downstream of it
    pub fn commit(&mut self, result: StageResult) {
        let stage = result.stage;
        self.0[stage.index()] = Some(result);
        self.clear_after(stage);
    }

    pub fn clear_after(&mut self, stage: Stage) {
        for later in stage.downstream() {
            self.0[later.index()] = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[cfg(test)]
    pub(crate) fn remove(&mut self, stage: Stage) {
        self.0[stage.index()] = None;
    }

    /// Dependencies of `stage` that have no result yet, in stage order
    pub fn missing_for(&self, stage: Stage) -> Vec<Stage> {
        stage
            .dependencies()
            .iter()
            .copied()
            .filter(|dep| !self.is_present(*dep))
            .collect()
    }

    pub fn present(&self) -> impl Iterator<Item = &StageResult> {
        self.0.iter().flatten()
    }

    pub fn trends(&self) -> Option<&TrendDiscovery> {
        match self.get(Stage::TrendDiscovery).map(|r| &r.output) {
            Some(StageOutput::TrendDiscovery(t)) => Some(t),
            _ => None,
        }
    }

    pub fn market(&self) -> Option<&MarketAnalysis> {
        match self.get(Stage::MarketVerification).map(|r| &r.output) {
            Some(StageOutput::MarketVerification(m)) => Some(m),
            _ => None,
        }
    }

    pub fn competitors(&self) -> Option<&CompetitorAnalysis> {
        match self.get(Stage::CompetitorAnalysis).map(|r| &r.output) {
            Some(StageOutput::CompetitorAnalysis(c)) => Some(c),
            _ => None,
        }
    }

    pub fn go_to_market(&self) -> Option<&GoToMarketStrategy> {
        match self.get(Stage::GoToMarket).map(|r| &r.output) {
            Some(StageOutput::GoToMarket(g)) => Some(g),
            _ => None,
        }
    }

    pub fn blueprint(&self) -> Option<&SolutionBlueprint> {
        match self.get(Stage::Blueprint).map(|r| &r.output) {
            Some(StageOutput::Blueprint(b)) => Some(b),
            _ => None,
        }
    }

    /// Area of interest the trend stage ran with
    pub fn area_of_interest(&self) -> Option<&str> {
        match self.get(Stage::TrendDiscovery).map(|r| &r.request) {
            Some(StageRequest::TrendDiscovery { area_of_interest }) => Some(area_of_interest),
            _ => None,
        }
    }

    /// Industry the market stage ran with
    pub fn industry(&self) -> Option<&str> {
        match self.get(Stage::MarketVerification).map(|r| &r.request) {
            Some(StageRequest::MarketVerification { industry, .. }) => Some(industry),
            _ => None,
        }
    }
}

/// Lifecycle of the most recent run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Progress label shown while a stage is running
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressPhase {
    pub stage: Stage,
    pub step: usize,
    pub total_steps: usize,
    pub label: String,
}

impl ProgressPhase {
    pub fn first(stage: Stage) -> Self {
        Self::at(stage, 0)
    }

    /// The phase at `step`, clamped to the last declared step
    pub fn at(stage: Stage, step: usize) -> Self {
        let steps = stage.steps();
        let step = step.min(steps.len().saturating_sub(1));
        Self {
            stage,
            step,
            total_steps: steps.len(),
            label: steps.get(step).copied().unwrap_or_default().to_string(),
        }
    }

    pub fn is_last(&self) -> bool {
        self.step + 1 >= self.total_steps
    }
}

/// Defaults offered by the competitor form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompetitorPrefill {
    pub industry: String,
    pub problem: String,
}

/// Snapshot of the whole session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineState {
    pub results: StageResults,
    pub active_stage: Stage,
    pub status: RunStatus,
    pub running_stage: Option<Stage>,
    pub last_error: Option<String>,
    pub progress: Option<ProgressPhase>,
    /// Bumped by every reset; runs started in an older epoch never commit
    pub epoch: u64,
}

impl PipelineState {
    pub fn is_busy(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Whether every dependency of `stage` has a result
    pub fn is_unlocked(&self, stage: Stage) -> bool {
        self.results.missing_for(stage).is_empty()
    }

    /// Trend names a user can pick as the market stage's industry
    pub fn trend_topics(&self) -> Vec<String> {
        self.results
            .trends()
            .map(|t| t.topic_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Competitor inputs derived from the market result
    pub fn competitor_prefill(&self) -> Option<CompetitorPrefill> {
        let market = self.results.market()?;
        Some(CompetitorPrefill {
            industry: self.results.industry()?.to_string(),
            problem: market.ideal_solution.clone(),
        })
    }

    /// Keyword cloud over the market stage's pain points
    pub fn pain_point_keywords(&self) -> Vec<Keyword> {
        self.results
            .market()
            .map(|m| keyword_cloud(&m.pain_point_text()))
            .unwrap_or_default()
    }

    /// Feature completeness bars for the competitor chart
    pub fn completeness_chart(&self) -> Vec<CompletenessBar> {
        self.results
            .competitors()
            .map(CompetitorAnalysis::completeness_chart)
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Canned stage outputs shared by the pipeline tests

    use serde_json::{json, Value};

    pub fn trends_json() -> Value {
        let topics: Vec<Value> = (1..=5)
            .map(|i| {
                json!({
                    "topicName": format!("Trend {i}"),
                    "reasonForTrend": "Rising search volume",
                    "exampleDiscussion": "Has anyone tried this?"
                })
            })
            .collect();
        json!({ "trendingTopics": topics })
    }

    pub fn market_json(tag: &str) -> Value {
        json!({
            "painPoints": [{
                "point": format!("Scheduling chaos {tag}"),
                "exampleQuote": "I double-booked again!",
                "emotionalImpact": "Embarrassment",
                "workaround": "Paper calendar",
                "cost": "Two hours a week"
            }],
            "insufficientSolutions": "Generic calendars ignore pets",
            "undervaluedSegment": "Solo dog walkers",
            "idealSolution": format!("A walker-first scheduler {tag}"),
            "confirmationMethods": "Interview ten walkers"
        })
    }

    pub fn competitors_json() -> Value {
        json!({
            "competitors": [{
                "name": "Rover", "usp": "Marketplace", "pricing": "Commission",
                "keyFeatures": "Booking", "customerLikes": "Reach",
                "customerComplaints": "Fees", "marketingStrategy": "Paid ads",
                "featureCompleteness": 70
            }],
            "marketGaps": [{ "gap": "No solo tier", "description": "Fees hurt small walkers" }]
        })
    }

    pub fn gtm_json() -> Value {
        json!({
            "targetAudience": "Solo dog walkers in cities",
            "identifiedProblems": "Scheduling chaos",
            "marketInterestIndicators": [{ "indicator": "r/dogwalking", "description": "Active" }],
            "redFlags": [{ "flag": "Low budgets", "description": "Price sensitive" }]
        })
    }

    pub fn blueprint_json() -> Value {
        json!({
            "solutionOverview": "Mobile scheduler",
            "coreFeatures": [{ "feature": "Route planner", "description": "d", "userProblemSolved": "Scheduling chaos" }],
            "techStack": [{ "category": "Frontend", "tool": "Flutter", "justification": "Mobile" }],
            "implementationRoadmap": [{ "phase": "Phase 1: MVP", "duration": "6 weeks", "milestones": ["Booking"] }],
            "risksAndMitigations": [{ "risk": "Churn", "mitigation": "Annual plan" }],
            "ethicalConsiderations": "Location privacy"
        })
    }
}
