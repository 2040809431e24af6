//! # Trend Skill
//!
//! Stage 0. Scouts a broad area of interest for emerging topics using live
//! web research. The topics seed the industry of the market stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single emerging topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendingTopic {
    /// Short, specific name of the trend, usable as an industry to analyze.
    pub topic_name: String,
    /// Why this topic is gaining momentum right now, citing concrete signals.
    pub reason_for_trend: String,
    /// A realistic example of an online discussion where the trend shows up.
    pub example_discussion: String,
}

/// Output of the trend discovery stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendDiscovery {
    /// The top 5 emerging topics in the area of interest, most promising first.
    pub trending_topics: Vec<TrendingTopic>,
}

impl TrendDiscovery {
    /// Topic names in order, for seeding the market stage
    pub fn topic_names(&self) -> Vec<&str> {
        self.trending_topics
            .iter()
            .map(|t| t.topic_name.as_str())
            .collect()
    }
}

/// Stage directive for an area of interest
pub fn directive(area_of_interest: &str) -> String {
    format!(
        "Discover the top 5 emerging trends within \"{area_of_interest}\". \
         Search the web for recent discussions, launches, and news to find topics that are gaining momentum. \
         For each trend, explain why it is trending now and give a realistic example of an online discussion about it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_quotes_area() {
        let text = directive("pet tech");
        assert!(text.contains("\"pet tech\""));
        assert!(text.contains("top 5"));
    }

    #[test]
    fn test_topic_names_keep_order() {
        let trends = TrendDiscovery {
            trending_topics: vec![
                TrendingTopic {
                    topic_name: "Smart litter boxes".into(),
                    reason_for_trend: "Kickstarter growth".into(),
                    example_discussion: "r/cats thread".into(),
                },
                TrendingTopic {
                    topic_name: "Pet telehealth".into(),
                    reason_for_trend: "Vet shortages".into(),
                    example_discussion: "Forum post".into(),
                },
            ],
        };
        assert_eq!(
            trends.topic_names(),
            vec!["Smart litter boxes", "Pet telehealth"]
        );
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let json = serde_json::json!({
            "trendingTopics": [{
                "topicName": "A",
                "reasonForTrend": "B",
                "exampleDiscussion": "C"
            }]
        });
        let parsed: TrendDiscovery = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.trending_topics[0].reason_for_trend, "B");
    }
}
