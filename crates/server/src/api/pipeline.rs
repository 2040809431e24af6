//! # Pipeline API
//!
//! JSON endpoints over the shared orchestrator, plus a live event stream.

use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;

use venturelab_core::error::PipelineError;
use venturelab_core::llm::{display_citations, GroundingReference};
use venturelab_core::pipeline::{
    CompetitorPrefill, PipelineState, Stage, StageRequest, StageResult,
};
use venturelab_core::skills::competitor_skill::CompletenessBar;
use venturelab_core::skills::Keyword;

use crate::AppState;

/// Snapshot plus everything a client derives from it
#[derive(Debug, Serialize)]
pub struct PipelineView {
    #[serde(flatten)]
    pub state: PipelineState,
    pub busy: bool,
    /// Stages whose dependencies are all satisfied
    pub unlocked: Vec<Stage>,
    pub trend_topics: Vec<String>,
    pub competitor_prefill: Option<CompetitorPrefill>,
    pub completeness_chart: Vec<CompletenessBar>,
}

impl From<PipelineState> for PipelineView {
    fn from(state: PipelineState) -> Self {
        Self {
            busy: state.is_busy(),
            unlocked: Stage::ALL
                .into_iter()
                .filter(|s| state.is_unlocked(*s))
                .collect(),
            trend_topics: state.trend_topics(),
            competitor_prefill: state.competitor_prefill(),
            completeness_chart: state.completeness_chart(),
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub stage: Stage,
}

/// Result of a successful run
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub result: StageResult,
    /// Citations ready for display
    pub sources: Vec<GroundingReference>,
}

/// Error body for refused or failed runs
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// `PipelineError` mapped onto HTTP
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            PipelineError::Busy { .. } => (StatusCode::CONFLICT, "busy"),
            PipelineError::Superseded { .. } => (StatusCode::CONFLICT, "superseded"),
            PipelineError::MissingDependency { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "missing_dependency")
            }
            PipelineError::EmptyInput { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "empty_input"),
            PipelineError::Stage { source, .. } => (StatusCode::BAD_GATEWAY, source.kind()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: code,
            message: self.0.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_pipeline))
        .route("/select", post(select_stage))
        .route("/run", post(run_stage))
        .route("/reset", post(reset_pipeline))
        .route("/events", get(pipeline_events))
        .route("/keywords", get(get_keywords))
}

/// Current session
async fn get_pipeline(State(state): State<AppState>) -> Json<PipelineView> {
    Json(state.orchestrator.snapshot().await.into())
}

/// Focus a stage
async fn select_stage(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Json<PipelineView> {
    state.orchestrator.select_stage(req.stage).await;
    Json(state.orchestrator.snapshot().await.into())
}

/// Run a stage and wait for it to finish
async fn run_stage(
    State(state): State<AppState>,
    Json(req): Json<StageRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let result = state.orchestrator.run_stage(req).await.map_err(ApiError)?;
    let sources = display_citations(&result.citations);
    Ok(Json(RunResponse { result, sources }))
}

/// Start over
async fn reset_pipeline(State(state): State<AppState>) -> Json<PipelineView> {
    state.orchestrator.reset().await;
    Json(state.orchestrator.snapshot().await.into())
}

/// Pain point keyword cloud for the market stage
async fn get_keywords(State(state): State<AppState>) -> Json<Vec<Keyword>> {
    Json(state.orchestrator.snapshot().await.pain_point_keywords())
}

/// SSE stream of pipeline events
async fn pipeline_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events: BoxStream<'static, Result<Event, Infallible>> = match state.orchestrator.subscribe() {
        Some(rx) => BroadcastStream::new(rx)
            .filter_map(|msg| async move {
                match msg {
                    Ok(event) => Event::default()
                        .event("pipeline")
                        .json_data(&event)
                        .ok()
                        .map(Ok::<Event, Infallible>),
                    Err(lagged) => {
                        tracing::warn!("SSE subscriber lagged: {}", lagged);
                        None
                    }
                }
            })
            .boxed(),
        None => stream::empty().boxed(),
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}
