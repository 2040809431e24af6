//! # Go-to-Market Skill
//!
//! Stage 3. Searches the web for evidence that the underserved segment found
//! by the market stage cares about its problems, and reports red flags.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Evidence of market interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndicator {
    /// A concrete signal of demand (e.g., 'Active subreddit with 200k members').
    pub indicator: String,
    /// What the signal means for a founder targeting this audience.
    pub description: String,
}

/// A reason for caution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedFlag {
    /// A concise summary of the risk (e.g., 'Low willingness to pay').
    pub flag: String,
    /// Why it matters and what evidence points to it.
    pub description: String,
}

/// Output of the go-to-market stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoToMarketStrategy {
    /// A sharpened description of who to sell to first.
    pub target_audience: String,
    /// The problems this audience is dealing with, restated in their own terms.
    pub identified_problems: String,
    /// Signals found on the web that this audience wants a solution.
    pub market_interest_indicators: Vec<MarketIndicator>,
    /// Warning signs that the market may be hard to win.
    pub red_flags: Vec<RedFlag>,
}

/// Stage directive for an audience and the problems they face
pub fn directive(target_audience: &str, problems: &str) -> String {
    format!(
        "Develop a go-to-market validation strategy for this target audience: \"{target_audience}\". \
         They are dealing with these problems: \"{problems}\". \
         Use web search to find real market interest indicators showing this audience wants a solution, \
         and identify any red flags that could make this market difficult. \
         Build on the competitor findings below and do not recommend positioning a competitor already owns."
    )
}
