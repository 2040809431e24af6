//! # Pipeline Stages
//!
//! The five fixed stages, their dependency topology, and the step labels
//! shown while each one is busy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Discovering trending topics in a broad area of interest
    #[default]
    TrendDiscovery,
    /// Verifying market pain points for an industry
    MarketVerification,
    /// Dissecting the competitors for a specific problem
    CompetitorAnalysis,
    /// Building the go-to-market strategy
    GoToMarket,
    /// Writing the implementation blueprint
    Blueprint,
}

/// Number of stages in the pipeline
pub const STAGE_COUNT: usize = 5;

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::TrendDiscovery,
        Stage::MarketVerification,
        Stage::CompetitorAnalysis,
        Stage::GoToMarket,
        Stage::Blueprint,
    ];

    /// Position of the stage (0..=4)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look a stage up by position
    pub fn from_index(index: usize) -> Option<Stage> {
        Stage::ALL.get(index).copied()
    }

    /// Stages whose results must exist before this one may run
    pub fn dependencies(self) -> &'static [Stage] {
        match self {
            Stage::TrendDiscovery => &[],
            Stage::MarketVerification => &[],
            Stage::CompetitorAnalysis => &[Stage::MarketVerification],
            Stage::GoToMarket => &[Stage::MarketVerification, Stage::CompetitorAnalysis],
            Stage::Blueprint => &[
                Stage::TrendDiscovery,
                Stage::MarketVerification,
                Stage::CompetitorAnalysis,
                Stage::GoToMarket,
            ],
        }
    }

    /// Stages after this one, whose results go stale when it re-runs
    pub fn downstream(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().skip(self.index() + 1)
    }

    /// Whether the collaborator may browse the web for this stage by default
    pub fn uses_web_research(self) -> bool {
        matches!(
            self,
            Stage::TrendDiscovery | Stage::GoToMarket | Stage::Blueprint
        )
    }

    /// Human-readable name
    pub fn title(self) -> &'static str {
        match self {
            Stage::TrendDiscovery => "Trend Discovery",
            Stage::MarketVerification => "Market Verification",
            Stage::CompetitorAnalysis => "Competitor Analysis",
            Stage::GoToMarket => "Go-to-Market Strategy",
            Stage::Blueprint => "Solution Blueprint",
        }
    }

    /// What the stage is doing, for "An error occurred while ..." messages
    pub fn activity(self) -> &'static str {
        match self {
            Stage::TrendDiscovery => "discovering trends",
            Stage::MarketVerification => "analyzing the market",
            Stage::CompetitorAnalysis => "analyzing competitors",
            Stage::GoToMarket => "developing the go-to-market strategy",
            Stage::Blueprint => "designing the solution blueprint",
        }
    }

    /// Progress labels cycled through while the stage is busy
    pub fn steps(self) -> &'static [&'static str] {
        match self {
            Stage::TrendDiscovery => &[
                "Scanning online communities and news...",
                "Spotting recurring discussions...",
                "Ranking emerging topics...",
                "Collecting sources...",
            ],
            Stage::MarketVerification => &[
                "Reading discussions in the industry...",
                "Extracting recurring pain points...",
                "Evaluating existing solutions...",
                "Sizing the underserved segment...",
            ],
            Stage::CompetitorAnalysis => &[
                "Identifying top competitors...",
                "Reviewing pricing and positioning...",
                "Collecting customer feedback...",
                "Scoring feature completeness...",
                "Locating market gaps...",
            ],
            Stage::GoToMarket => &[
                "Profiling the target audience...",
                "Searching for market interest signals...",
                "Checking for red flags...",
                "Compiling the strategy...",
            ],
            Stage::Blueprint => &[
                "Synthesizing prior research...",
                "Defining core features...",
                "Selecting the tech stack...",
                "Planning the roadmap...",
                "Assessing risks and ethics...",
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
