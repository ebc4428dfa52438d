//! Delphi: classify → rounds 1..K → synthesis.
//!
//! The defining invariant: after round 1, each panelist sees only its own
//! prior answer plus the aggregate statistics of the previous round — never
//! an individual peer answer.

use serde::Serialize;

use crate::aggregate::{Distribution, NumericSummary, distribution, numeric_summary};
use crate::modes::{RunContext, RunOutcome};
use crate::parsers::delphi::{
    Classification, ConfidenceLevel, QuestionKind, parse_classification, parse_confidence_level,
    parse_numeric_estimate, parse_qualitative_answer,
};
use crate::prompts;
use crate::stages::StageRecord;

const DEFAULT_MAX_ROUNDS: usize = 3;
const DEFAULT_NUMERIC_THRESHOLD: f64 = 0.15;
/// Percentage: 75 means 75% of panelists on the modal answer.
const DEFAULT_QUALITATIVE_THRESHOLD: f64 = 75.0;

/// One panelist's answer in one round.
#[derive(Debug, Clone, Serialize)]
struct PanelistAnswer {
    model: String,
    estimate: Option<f64>,
    answer: Option<String>,
    confidence: ConfidenceLevel,
    /// False when the previous round's answer was carried forward.
    changed: bool,
}

#[derive(Serialize)]
struct RoundStats<'a> {
    round: usize,
    converged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    numeric: Option<&'a NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    qualitative: Option<&'a Distribution>,
    confidence_counts: [usize; 3],
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    final_value: &'a str,
    rounds_run: usize,
    converged: bool,
    response: &'a str,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Classify: facilitator tags the question numeric | qualitative.
    ctx.phase_start("classify");
    let facilitator = ctx.special_role_model();
    let classification = classify(ctx, &facilitator).await;
    ctx.phase_complete("classify", &classification);

    let max_rounds = ctx.config.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS).max(1);
    let numeric_threshold = ctx
        .config
        .numeric_threshold
        .unwrap_or(DEFAULT_NUMERIC_THRESHOLD);
    let qualitative_threshold = ctx
        .config
        .qualitative_threshold
        .unwrap_or(DEFAULT_QUALITATIVE_THRESHOLD);

    let mut rounds: Vec<Vec<PanelistAnswer>> = Vec::new();
    let mut converged = false;
    let mut last_numeric: Option<NumericSummary> = None;
    let mut last_qualitative: Option<Distribution> = None;

    for round in 1..=max_rounds {
        ctx.phase_start("round");
        let answers = if round == 1 {
            run_first_round(ctx, &classification).await
        } else {
            let previous = rounds.last().cloned().unwrap_or_default();
            run_feedback_round(
                ctx,
                &classification,
                round,
                &previous,
                last_numeric.as_ref(),
                last_qualitative.as_ref(),
            )
            .await
        };

        if round == 1 && answers.len() < 3 {
            return ctx.fatal("round", "fewer than 3 panelists answered round 1");
        }

        // Round statistics over panelists that produced a value.
        let (numeric, qualitative) = match classification.kind {
            QuestionKind::Numeric => {
                let values: Vec<f64> = answers.iter().filter_map(|a| a.estimate).collect();
                (numeric_summary(&values), None)
            }
            QuestionKind::Qualitative => {
                let values: Vec<String> = answers.iter().filter_map(|a| a.answer.clone()).collect();
                (None, distribution(&values))
            }
        };

        converged = match classification.kind {
            QuestionKind::Numeric => numeric
                .as_ref()
                .is_some_and(|s| s.cv < numeric_threshold),
            QuestionKind::Qualitative => qualitative
                .as_ref()
                .is_some_and(|d| d.agreement_pct >= qualitative_threshold),
        };

        let confidence_counts = count_confidences(&answers);
        ctx.phase_complete(
            "round",
            &RoundStats {
                round,
                converged,
                numeric: numeric.as_ref(),
                qualitative: qualitative.as_ref(),
                confidence_counts,
            },
        );

        last_numeric = numeric;
        last_qualitative = qualitative;
        rounds.push(answers);

        if converged {
            break;
        }
    }

    // Final value: median (numeric) or mode (qualitative) of the last round.
    let final_value = match classification.kind {
        QuestionKind::Numeric => last_numeric
            .as_ref()
            .map(|s| format!("{}", s.median))
            .unwrap_or_else(|| "no estimate".to_string()),
        QuestionKind::Qualitative => last_qualitative
            .as_ref()
            .map(|d| d.mode.clone())
            .unwrap_or_else(|| "no answer".to_string()),
    };

    // Synthesis: the facilitator writes the final report.
    ctx.phase_start("synthesis");
    let rounds_summary = summarize_rounds(&rounds, &classification);
    let prompt = prompts::delphi_synthesis_prompt(&ctx.question, &rounds_summary, &final_value);
    let Some(reply) = ctx.gateway.query_one(&facilitator, &prompt, ctx.timeout).await else {
        return ctx.fatal("synthesis", "facilitator did not respond");
    };
    ctx.stages.push(
        StageRecord::new("synthesis", &reply.content)
            .model(&facilitator)
            .role("facilitator")
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "synthesis",
        &SynthesisPayload {
            final_value: &final_value,
            rounds_run: rounds.len(),
            converged,
            response: &reply.content,
        },
    );
    RunOutcome::Completed
}

async fn classify(ctx: &mut RunContext, facilitator: &str) -> Classification {
    let prompt = prompts::delphi_classify_prompt(&ctx.question);
    match ctx.gateway.query_one(facilitator, &prompt, ctx.timeout).await {
        Some(reply) => {
            let classification = parse_classification(&reply.content);
            ctx.stages.push(
                StageRecord::new("classify", &reply.content)
                    .model(facilitator)
                    .role("facilitator")
                    .parsed(&classification)
                    .time_ms(reply.response_time_ms),
            );
            classification
        }
        None => {
            tracing::warn!("classifier call failed — defaulting to qualitative");
            parse_classification("")
        }
    }
}

/// Round 1: identical prompt for all panelists. A panelist whose value
/// fails to parse is excluded from the round.
async fn run_first_round(
    ctx: &mut RunContext,
    classification: &Classification,
) -> Vec<PanelistAnswer> {
    let prompt =
        prompts::delphi_round1_prompt(&ctx.question, classification.kind, &classification.options);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut answers = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        if let Some(answer) = parse_panelist(&model, &reply.content, classification.kind, true) {
            ctx.stages.push(
                StageRecord::new("round_1", &reply.content)
                    .model(&model)
                    .role("panelist")
                    .parsed(&answer)
                    .time_ms(reply.response_time_ms),
            );
            answers.push(answer);
        }
    }
    answers
}

/// Rounds 2..K: per-panelist prompts with own prior answer plus the
/// previous round's aggregates. A failing panelist carries its previous
/// answer forward with `changed = false`.
async fn run_feedback_round(
    ctx: &mut RunContext,
    classification: &Classification,
    round: usize,
    previous: &[PanelistAnswer],
    numeric: Option<&NumericSummary>,
    qualitative: Option<&Distribution>,
) -> Vec<PanelistAnswer> {
    let calls = previous.iter().map(|prev| {
        let prompt = match classification.kind {
            QuestionKind::Numeric => prompts::delphi_feedback_numeric_prompt(
                &ctx.question,
                prev.estimate.unwrap_or_default(),
                numeric.unwrap_or(&EMPTY_SUMMARY),
            ),
            QuestionKind::Qualitative => prompts::delphi_feedback_qualitative_prompt(
                &ctx.question,
                prev.answer.as_deref().unwrap_or(""),
                qualitative.unwrap_or(&EMPTY_DISTRIBUTION),
            ),
        };
        let gateway = ctx.gateway.clone();
        let timeout = ctx.timeout;
        async move {
            let reply = gateway.query_one(&prev.model, &prompt, timeout).await;
            (prev, reply)
        }
    });
    let results = futures_util::future::join_all(calls).await;

    let stage_type = format!("round_{round}");
    let mut answers = Vec::new();
    for (prev, reply) in results {
        match reply.and_then(|r| {
            parse_panelist(&prev.model, &r.content, classification.kind, true)
                .map(|a| (a, r.content.clone(), r.response_time_ms))
        }) {
            Some((answer, content, ms)) => {
                ctx.stages.push(
                    StageRecord::new(&stage_type, &content)
                        .model(&prev.model)
                        .role("panelist")
                        .parsed(&answer)
                        .time_ms(ms),
                );
                answers.push(answer);
            }
            None => {
                tracing::warn!(model = %prev.model, round, "panelist failed — carrying forward");
                let mut carried = prev.clone();
                carried.changed = false;
                answers.push(carried);
            }
        }
    }
    answers
}

static EMPTY_SUMMARY: NumericSummary = NumericSummary {
    n: 0,
    mean: 0.0,
    median: 0.0,
    stddev: 0.0,
    min: 0.0,
    max: 0.0,
    cv: 0.0,
};

static EMPTY_DISTRIBUTION: Distribution = Distribution {
    n: 0,
    counts: Vec::new(),
    mode: String::new(),
    mode_count: 0,
    agreement_pct: 0.0,
};

fn parse_panelist(
    model: &str,
    text: &str,
    kind: QuestionKind,
    changed: bool,
) -> Option<PanelistAnswer> {
    let confidence = parse_confidence_level(text);
    match kind {
        QuestionKind::Numeric => {
            let estimate = parse_numeric_estimate(text)?;
            Some(PanelistAnswer {
                model: model.to_string(),
                estimate: Some(estimate),
                answer: None,
                confidence,
                changed,
            })
        }
        QuestionKind::Qualitative => {
            let answer = parse_qualitative_answer(text)?;
            Some(PanelistAnswer {
                model: model.to_string(),
                estimate: None,
                answer: Some(answer),
                confidence,
                changed,
            })
        }
    }
}

fn count_confidences(answers: &[PanelistAnswer]) -> [usize; 3] {
    let mut counts = [0usize; 3];
    for a in answers {
        match a.confidence {
            ConfidenceLevel::Low => counts[0] += 1,
            ConfidenceLevel::Medium => counts[1] += 1,
            ConfidenceLevel::High => counts[2] += 1,
        }
    }
    counts
}

fn summarize_rounds(rounds: &[Vec<PanelistAnswer>], classification: &Classification) -> String {
    rounds
        .iter()
        .enumerate()
        .map(|(i, answers)| {
            let stat = match classification.kind {
                QuestionKind::Numeric => {
                    let values: Vec<f64> = answers.iter().filter_map(|a| a.estimate).collect();
                    numeric_summary(&values)
                        .map(|s| {
                            format!(
                                "mean {:.2}, median {:.2}, stddev {:.2}, CV {:.3}",
                                s.mean, s.median, s.stddev, s.cv
                            )
                        })
                        .unwrap_or_else(|| "no estimates".to_string())
                }
                QuestionKind::Qualitative => {
                    let values: Vec<String> =
                        answers.iter().filter_map(|a| a.answer.clone()).collect();
                    distribution(&values)
                        .map(|d| {
                            format!("{:.0}% agreement on \"{}\" ({} answers)", d.agreement_pct, d.mode, d.n)
                        })
                        .unwrap_or_else(|| "no answers".to_string())
                }
            };
            format!("Round {}: {} panelists — {}", i + 1, answers.len(), stat)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
