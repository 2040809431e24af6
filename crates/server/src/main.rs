//! VentureLab Server
//!
//! Axum server exposing the research pipeline as a JSON API with a live
//! event stream. One orchestrator (one session) per process.

mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use clap::Parser;
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use venturelab_core::models::{create_collaborator, LlmProvider, ModelConfig};
use venturelab_core::pipeline::{Orchestrator, OrchestratorConfig};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Parser, Clone)]
#[command(author, version, about = "VentureLab - AI business research pipeline")]
struct Args {
    /// Address to bind
    #[arg(long, env = "VENTURELAB_HOST", default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[arg(short, long, env = "VENTURELAB_PORT", default_value = "8080")]
    port: u16,
    /// Seconds between progress label changes while a stage runs
    #[arg(long, default_value = "2.5")]
    progress_interval: f64,
    /// Disable web research for every stage
    #[arg(long)]
    no_web_research: bool,
}

#[derive(Clone, Serialize)]
struct ProviderInfo {
    provider: LlmProvider,
    name: &'static str,
    model: String,
    web_research: bool,
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,venturelab_core=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    // A missing API key stops the process here, before any stage can run
    let model_config = ModelConfig::from_env().context("Invalid model configuration")?;
    let collaborator =
        create_collaborator(&model_config).context("Cannot start without an AI collaborator")?;

    let mut config = OrchestratorConfig {
        progress_interval_ms: (args.progress_interval.max(0.0) * 1000.0) as u64,
        ..OrchestratorConfig::default()
    };
    if args.no_web_research {
        config = config.without_web_research();
    }

    let (event_tx, _) = broadcast::channel(256);
    let orchestrator = Orchestrator::new(collaborator, config).with_event_channel(event_tx);
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
    };

    let provider = ProviderInfo {
        provider: model_config.provider,
        name: model_config.provider.display_name(),
        model: model_config.model.clone(),
        web_research: model_config.provider.supports_web_research(),
    };

    let app = Router::new()
        .nest("/api/v1/pipeline", api::pipeline::pipeline_routes())
        .route(
            "/api/v1/provider",
            get(move || {
                let provider = provider.clone();
                async move { Json(provider) }
            }),
        )
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    tracing::info!(
        %addr,
        provider = model_config.provider.display_name(),
        model = %model_config.model,
        "VentureLab server running"
    );
    tracing::info!("Pipeline: /api/v1/pipeline (GET), /select, /run, /reset, /events, /keywords");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing()?;

    run_server(args).await
}
