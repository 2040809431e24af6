//! Default system instructions bundled at compile time.
//!
//! One template per stage; each stage skill sends its template as the
//! collaborator's system instruction.

use crate::pipeline::Stage;

/// Trend Scout - finds emerging topics in a broad area of interest
pub const TREND_SCOUT: &str = include_str!("defaults/trend_scout.md");

/// Market Researcher - verifies pain points in an industry
pub const MARKET_RESEARCHER: &str = include_str!("defaults/market_researcher.md");

/// Competitor Analyst - dissects competitors and finds market gaps
pub const COMPETITOR_ANALYST: &str = include_str!("defaults/competitor_analyst.md");

/// GTM Strategist - validates demand and flags risks
pub const GTM_STRATEGIST: &str = include_str!("defaults/gtm_strategist.md");

/// Solution Architect - turns the research into a build plan
pub const SOLUTION_ARCHITECT: &str = include_str!("defaults/solution_architect.md");

/// System instruction for a stage
pub fn system_instruction(stage: Stage) -> &'static str {
    match stage {
        Stage::TrendDiscovery => TREND_SCOUT,
        Stage::MarketVerification => MARKET_RESEARCHER,
        Stage::CompetitorAnalysis => COMPETITOR_ANALYST,
        Stage::GoToMarket => GTM_STRATEGIST,
        Stage::Blueprint => SOLUTION_ARCHITECT,
    }
}

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("trend_scout", TREND_SCOUT),
        ("market_researcher", MARKET_RESEARCHER),
        ("competitor_analyst", COMPETITOR_ANALYST),
        ("gtm_strategist", GTM_STRATEGIST),
        ("solution_architect", SOLUTION_ARCHITECT),
    ]
}
