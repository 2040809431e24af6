//! # Prompt Composer
//!
//! Builds the collaborator call for a stage from the user's request and the
//! results gathered so far. The prompt always has three parts:
//!
//! 1. the stage directive,
//! 2. every upstream result the stage depends on, dumped as JSON,
//! 3. the required output shape, one line per field.
//!
//! Composition is pure. It also resolves defaulted inputs (the competitor
//! stage's industry and problem) and rejects requests whose dependencies
//! or inputs are missing.

use std::sync::OnceLock;

use super::shape::ShapeDescriptor;
use super::{blueprint_skill, competitor_skill, gtm_skill, market_skill, prompts, trend_skill};
use crate::error::PipelineError;
use crate::pipeline::{Stage, StageRequest, StageResults, STAGE_COUNT};

/// Everything needed to call the collaborator for one stage
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub stage: Stage,
    /// The request with defaults filled in and inputs trimmed
    pub request: StageRequest,
    pub system_instruction: &'static str,
    pub prompt: String,
    pub shape: &'static ShapeDescriptor,
    pub web_research: bool,
}

/// Response contract of a stage
pub fn shape_for(stage: Stage) -> &'static ShapeDescriptor {
    static SHAPES: OnceLock<[ShapeDescriptor; STAGE_COUNT]> = OnceLock::new();
    let shapes = SHAPES.get_or_init(|| {
        [
            ShapeDescriptor::of::<trend_skill::TrendDiscovery>(),
            ShapeDescriptor::of::<market_skill::MarketAnalysis>(),
            ShapeDescriptor::of::<competitor_skill::CompetitorAnalysis>(),
            ShapeDescriptor::of::<gtm_skill::GoToMarketStrategy>(),
            ShapeDescriptor::of::<blueprint_skill::SolutionBlueprint>(),
        ]
    });
    &shapes[stage.index()]
}

/// Compose the call for `request` against the current results
pub fn compose(
    request: &StageRequest,
    results: &StageResults,
) -> Result<ComposedPrompt, PipelineError> {
    let stage = request.stage();

    let missing = results.missing_for(stage);
    if !missing.is_empty() {
        return Err(PipelineError::MissingDependency { stage, missing });
    }

    let (request, directive) = resolve(request, results)?;
    let shape = shape_for(stage);

    let mut prompt = directive;
    if !stage.dependencies().is_empty() {
        prompt.push_str("\n\n## Prior findings\n");
        for dep in stage.dependencies() {
            if let Some(result) = results.get(*dep) {
                let dump = result
                    .output
                    .to_json_pretty()
                    .map_err(|source| PipelineError::Stage { stage, source })?;
                prompt.push_str(&format!(
                    "\n### {}\n```json\n{}\n```\n",
                    dep.title(),
                    dump
                ));
            }
        }
    }
    prompt.push_str(&format!(
        "\n\n## Required output\n\nRespond with a single JSON object with exactly these top-level fields:\n{}\n",
        shape.describe()
    ));

    Ok(ComposedPrompt {
        stage,
        request,
        system_instruction: prompts::system_instruction(stage),
        prompt,
        shape,
        web_research: stage.uses_web_research(),
    })
}

/// Fill defaults, check user inputs, and produce the stage directive
fn resolve(
    request: &StageRequest,
    results: &StageResults,
) -> Result<(StageRequest, String), PipelineError> {
    let stage = request.stage();
    let missing = || PipelineError::MissingDependency {
        stage,
        missing: results.missing_for(stage),
    };

    match request {
        StageRequest::TrendDiscovery { area_of_interest } => {
            let area = required(stage, area_of_interest, "an area of interest")?;
            Ok((StageRequest::trend(area), trend_skill::directive(area)))
        }
        StageRequest::MarketVerification { industry, deeper } => {
            let industry = required(stage, industry, "an industry to analyze")?;
            Ok((
                StageRequest::market(industry, *deeper),
                market_skill::directive(industry, *deeper),
            ))
        }
        StageRequest::CompetitorAnalysis { industry, problem } => {
            let industry = industry
                .as_deref()
                .or_else(|| results.industry())
                .unwrap_or_default();
            let problem = problem
                .as_deref()
                .or_else(|| results.market().map(|m| m.ideal_solution.as_str()))
                .unwrap_or_default();
            let industry = required(stage, industry, "an industry to analyze")?;
            let problem = required(stage, problem, "a specific problem")?;
            Ok((
                StageRequest::CompetitorAnalysis {
                    industry: Some(industry.to_string()),
                    problem: Some(problem.to_string()),
                },
                competitor_skill::directive(industry, problem),
            ))
        }
        StageRequest::GoToMarket => {
            let market = results.market().ok_or_else(missing)?;
            Ok((
                StageRequest::GoToMarket,
                gtm_skill::directive(&market.undervalued_segment, &market.problem_summary()),
            ))
        }
        StageRequest::Blueprint => {
            let area = results.area_of_interest().ok_or_else(missing)?;
            let industry = results.industry().ok_or_else(missing)?;
            Ok((
                StageRequest::Blueprint,
                blueprint_skill::directive(area, industry),
            ))
        }
    }
}

fn required<'a>(
    stage: Stage,
    value: &'a str,
    field: &'static str,
) -> Result<&'a str, PipelineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PipelineError::EmptyInput { stage, field })
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::fixtures::*;
    use crate::pipeline::{StageOutput, StageResult};
    use crate::skills::market_skill::DEEPER_CLAUSE;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn commit(results: &mut StageResults, request: StageRequest, value: serde_json::Value) {
        let stage = request.stage();
        results.commit(StageResult {
            stage,
            output: StageOutput::decode(stage, value).unwrap(),
            citations: vec![],
            request,
            completed_at: Utc::now(),
        });
    }

    fn through(stage: Stage) -> StageResults {
        let mut results = StageResults::default();
        let all = [
            (StageRequest::trend("Pets"), trends_json()),
            (StageRequest::market("Dog walking", false), market_json("v1")),
            (
                StageRequest::CompetitorAnalysis {
                    industry: Some("Dog walking".into()),
                    problem: Some("Scheduling".into()),
                },
                competitors_json(),
            ),
            (StageRequest::GoToMarket, gtm_json()),
        ];
        for (request, value) in all.into_iter().take(stage.index() + 1) {
            commit(&mut results, request, value);
        }
        results
    }

    #[test]
    fn test_shapes_cover_every_stage() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| shape_for(*s).name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "TrendDiscovery",
                "MarketAnalysis",
                "CompetitorAnalysis",
                "GoToMarketStrategy",
                "SolutionBlueprint"
            ]
        );
    }

    #[test]
    fn test_trend_prompt_has_no_prior_findings() {
        let composed = compose(&StageRequest::trend("  pet tech "), &StageResults::default()).unwrap();
        assert_eq!(composed.request, StageRequest::trend("pet tech"));
        assert!(composed.prompt.contains("\"pet tech\""));
        assert!(!composed.prompt.contains("Prior findings"));
        assert!(composed.prompt.contains("- `trendingTopics` (array)"));
        assert!(composed.web_research);
    }

    #[test]
    fn test_deeper_prompt_adds_only_the_clause() {
        let results = through(Stage::TrendDiscovery);
        let base = compose(&StageRequest::market("Pet tech", false), &results).unwrap();
        let deeper = compose(&StageRequest::market("Pet tech", true), &results).unwrap();
        assert_eq!(
            deeper.prompt.replacen(&format!(" {DEEPER_CLAUSE}"), "", 1),
            base.prompt
        );
        assert!(!base.web_research);
    }

    #[test]
    fn test_competitor_inputs_default_from_market() {
        let results = through(Stage::MarketVerification);
        let composed = compose(&StageRequest::competitors(), &results).unwrap();
        assert_eq!(
            composed.request,
            StageRequest::CompetitorAnalysis {
                industry: Some("Dog walking".into()),
                problem: Some("A walker-first scheduler v1".into()),
            }
        );
        assert!(composed.prompt.contains("### Market Verification\n```json\n"));
        assert!(composed.prompt.contains("\"undervaluedSegment\": \"Solo dog walkers\""));
    }

    #[test]
    fn test_explicit_blank_problem_is_rejected() {
        let results = through(Stage::MarketVerification);
        let request = StageRequest::CompetitorAnalysis {
            industry: None,
            problem: Some("   ".into()),
        };
        assert_eq!(
            compose(&request, &results).unwrap_err(),
            PipelineError::EmptyInput {
                stage: Stage::CompetitorAnalysis,
                field: "a specific problem"
            }
        );
    }

    #[test]
    fn test_gtm_dumps_only_its_dependencies() {
        let results = through(Stage::CompetitorAnalysis);
        let composed = compose(&StageRequest::GoToMarket, &results).unwrap();
        assert!(composed.prompt.contains("\"Solo dog walkers\""));
        assert!(composed.prompt.contains("### Market Verification"));
        assert!(composed.prompt.contains("### Competitor Analysis"));
        assert!(!composed.prompt.contains("### Trend Discovery"));
        assert!(composed.prompt.contains("\"featureCompleteness\": 70"));
    }

    #[test]
    fn test_prior_findings_are_complete_documents() {
        let results = through(Stage::CompetitorAnalysis);
        let composed = compose(&StageRequest::GoToMarket, &results).unwrap();
        for dep in Stage::GoToMarket.dependencies() {
            let output = &results.get(*dep).unwrap().output;
            let dump = output.to_json_pretty().unwrap();
            assert!(composed.prompt.contains(&format!("```json\n{dump}\n```")));
            let reparsed: serde_json::Value = serde_json::from_str(&dump).unwrap();
            assert_eq!(reparsed, serde_json::to_value(output).unwrap());
        }
        assert!(!composed.prompt.contains("```json\n{}\n```"));
    }

    #[test]
    fn test_blueprint_uses_all_prior_stages() {
        let results = through(Stage::GoToMarket);
        let composed = compose(&StageRequest::Blueprint, &results).unwrap();
        for dep in Stage::Blueprint.dependencies() {
            assert!(composed.prompt.contains(&format!("### {}", dep.title())));
        }
        assert!(composed.prompt.contains("\"Dog walking\""));
        assert!(composed.prompt.contains("\"Pets\""));
    }

    #[test]
    fn test_missing_dependencies_are_listed() {
        let err = compose(&StageRequest::Blueprint, &through(Stage::MarketVerification)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingDependency {
                stage: Stage::Blueprint,
                missing: vec![Stage::CompetitorAnalysis, Stage::GoToMarket],
            }
        );
    }

    #[test]
    fn test_dependency_check_precedes_input_check() {
        let request = StageRequest::CompetitorAnalysis {
            industry: Some(String::new()),
            problem: None,
        };
        let err = compose(&request, &StageResults::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDependency { .. }));
    }
}
