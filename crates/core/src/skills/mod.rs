//! # VentureLab Skills
//!
//! One skill per pipeline stage, plus the machinery every stage shares.
//!
//! ## Architecture
//!
//! ```text
//! StageRequest + StageResults
//!   └── composer   (directive + prior findings + shape)
//!         └── executor  (one collaborator call)
//!               └── response  (fence strip, parse, shape check)
//! ```
//!
//! ## Stage Skills
//!
//! - `trend_skill` - Emerging topics in an area of interest (web research)
//! - `market_skill` - Pain points, underserved segment, ideal solution
//! - `competitor_skill` - Competitors, feature completeness, market gaps
//! - `gtm_skill` - Market interest signals and red flags (web research)
//! - `blueprint_skill` - Features, stack, roadmap, risks (web research)
//!
//! **Analysis helpers:**
//! - `keywords` - Pain point keyword cloud

pub mod composer;
pub mod executor;
pub mod keywords;
pub mod prompts;
pub mod response;
pub mod shape;

// Stage Skills
pub mod blueprint_skill;
pub mod competitor_skill;
pub mod gtm_skill;
pub mod market_skill;
pub mod trend_skill;

// Re-exports for convenience
pub use composer::{compose, shape_for, ComposedPrompt};
pub use executor::{StageExecutor, StageOutcome};
pub use keywords::{keyword_cloud, Keyword};
pub use response::validate;
pub use shape::{FieldKind, FieldSpec, ShapeDescriptor};

pub use blueprint_skill::SolutionBlueprint;
pub use competitor_skill::CompetitorAnalysis;
pub use gtm_skill::GoToMarketStrategy;
pub use market_skill::MarketAnalysis;
pub use trend_skill::TrendDiscovery;
