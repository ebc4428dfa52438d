//! Confidence-Weighted: answers → softmax weights → synthesis.

use serde::Serialize;

use crate::aggregate::{is_confidence_outlier, softmax};
use crate::modes::{RunContext, RunOutcome};
use crate::parsers::confidence::{parse_confidence, parse_synthesis};
use crate::prompts;
use crate::stages::{ConversationTurn, StageRecord};

const DEFAULT_TEMPERATURE: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
struct WeightedAnswer {
    model: String,
    response: String,
    confidence: f64,
    parsed_successfully: bool,
    weight: f64,
    outlier: bool,
}

#[derive(Serialize)]
struct AnswersSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct WeightsPayload<'a> {
    weights: &'a [WeightedAnswer],
    temperature: f64,
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    synthesis: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration_notes: Option<&'a str>,
    single_answer: bool,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Answers: every model replies with a self-assessed confidence.
    ctx.phase_start("answers");
    let prompt = prompts::confidence_answer_prompt(&ctx.question);
    let replies = if ctx.history.is_empty() {
        ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await
    } else {
        let mut turns = ctx.history.clone();
        turns.push(ConversationTurn::user(&prompt));
        ctx.gateway
            .query_many_with_messages(&ctx.models, &turns, ctx.timeout)
            .await
    };

    let mut answers: Vec<WeightedAnswer> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let parsed = parse_confidence(&reply.content);
        ctx.stages.push(
            StageRecord::new("answer", &reply.content)
                .model(&model)
                .parsed(&parsed)
                .time_ms(reply.response_time_ms),
        );
        answers.push(WeightedAnswer {
            model,
            response: reply.content.clone(),
            confidence: parsed.value,
            parsed_successfully: parsed.parsed_successfully,
            weight: 0.0,
            outlier: is_confidence_outlier(parsed.value),
        });
    }
    if answers.is_empty() {
        return ctx.fatal("answers", "no model produced an answer");
    }
    ctx.phase_complete(
        "answers",
        &AnswersSummary {
            succeeded: answers.len(),
            failed: ctx.models.len() - answers.len(),
        },
    );

    // Single-answer edge case: skip softmax and synthesis entirely.
    if answers.len() == 1 {
        let mut only = answers.remove(0);
        only.weight = 1.0;
        ctx.phase_start("weights");
        ctx.phase_complete(
            "weights",
            &WeightsPayload {
                weights: std::slice::from_ref(&only),
                temperature: 0.0,
            },
        );
        ctx.phase_start("synthesis");
        ctx.phase_complete(
            "synthesis",
            &SynthesisPayload {
                synthesis: &only.response,
                calibration_notes: Some(
                    "Only one model answered; no cross-model calibration was possible.",
                ),
                single_answer: true,
            },
        );
        return RunOutcome::Completed;
    }

    // Weights: server-side softmax over confidences.
    ctx.phase_start("weights");
    let temperature = ctx.config.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    let confidences: Vec<f64> = answers.iter().map(|a| a.confidence).collect();
    let weights = softmax(&confidences, temperature);
    for (answer, weight) in answers.iter_mut().zip(&weights) {
        answer.weight = *weight;
    }
    // Synthesizer reads strongest-first.
    answers.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ctx.phase_complete(
        "weights",
        &WeightsPayload {
            weights: &answers,
            temperature,
        },
    );

    // Synthesis: one call over the weighted, outlier-tagged answers.
    ctx.phase_start("synthesis");
    let weighted_block = answers
        .iter()
        .map(|a| {
            let outlier_tag = if a.outlier { " [OUTLIER CONFIDENCE]" } else { "" };
            format!(
                "### {} (weight {:.1}%, confidence {:.2}{})\n{}",
                a.model,
                a.weight * 100.0,
                a.confidence,
                outlier_tag,
                a.response
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let synthesizer = ctx.special_role_model();
    let prompt = prompts::confidence_synthesis_prompt(&ctx.question, &weighted_block);
    let Some(reply) = ctx.gateway.query_one(&synthesizer, &prompt, ctx.timeout).await else {
        return ctx.fatal("synthesis", "synthesizer did not respond");
    };
    let parts = parse_synthesis(&reply.content);
    ctx.stages.push(
        StageRecord::new("synthesis", &reply.content)
            .model(&synthesizer)
            .role("synthesizer")
            .parsed(&parts)
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "synthesis",
        &SynthesisPayload {
            synthesis: &parts.synthesis,
            calibration_notes: parts.calibration_notes.as_deref(),
            single_answer: false,
        },
    );
    RunOutcome::Completed
}
