//! Peer Review: rubric-parameterized reviewers in parallel → consolidation.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::review::{ReviewerReport, criterion_consensus, parse_reviewer};
use crate::prompts;
use crate::stages::StageRecord;

/// Predefined rubric families, selected by `reviewType`.
fn rubric_for(review_type: &str) -> Vec<(String, f64)> {
    let raw: &[(&str, f64)] = match review_type {
        "code" => &[
            ("Correctness", 3.0),
            ("Readability", 2.0),
            ("Performance", 2.0),
            ("Security", 2.0),
            ("Test Coverage", 1.0),
        ],
        "document" => &[
            ("Accuracy", 3.0),
            ("Structure", 2.0),
            ("Clarity", 2.0),
            ("Completeness", 2.0),
            ("Style", 1.0),
        ],
        _ => &[
            ("Accuracy", 3.0),
            ("Completeness", 2.0),
            ("Clarity", 2.0),
            ("Rigor", 2.0),
            ("Usefulness", 1.0),
        ],
    };
    raw.iter().map(|(n, w)| (n.to_string(), *w)).collect()
}

#[derive(Serialize)]
struct ReviewerPayload<'a> {
    model: &'a str,
    overall: Option<f64>,
    findings: usize,
}

#[derive(Serialize)]
struct ConsolidationPayload<'a> {
    model: &'a str,
    response: &'a str,
    reviewers: usize,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    let content = ctx
        .config
        .content_to_check
        .clone()
        .unwrap_or_else(|| ctx.question.clone());
    let rubric: Vec<(String, f64)> = match ctx.config.custom_rubric {
        Some(ref custom) if !custom.is_empty() => custom
            .iter()
            .map(|c| (c.name.clone(), c.weight))
            .collect(),
        _ => rubric_for(ctx.config.review_type.as_deref().unwrap_or("general")),
    };

    // Reviewers in parallel.
    ctx.phase_start("review");
    let prompt = prompts::reviewer_prompt(&content, &rubric);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut reports: Vec<ReviewerReport> = Vec::new();
    let mut reviews: Vec<(String, String)> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let report = parse_reviewer(&reply.content, &rubric);
        ctx.stages.push(
            StageRecord::new("review", &reply.content)
                .model(&model)
                .role("reviewer")
                .parsed(&report)
                .time_ms(reply.response_time_ms),
        );
        ctx.sink.emit_with(
            "reviewer_report",
            &ReviewerPayload {
                model: &model,
                overall: report.overall,
                findings: report.findings.len(),
            },
        );
        reviews.push((model, reply.content.clone()));
        reports.push(report);
    }
    if reports.len() < 2 {
        return ctx.fatal("review", "fewer than 2 reviewers responded");
    }

    let consensus = criterion_consensus(&reports);
    ctx.phase_complete(
        "review",
        &serde_json::json!({
            "reviewers": reports.len(),
            "consensus": consensus,
        }),
    );

    // Consolidation: one call over all raw reviews plus the consensus.
    ctx.phase_start("consolidation");
    let consolidator = ctx.special_role_model();
    let consensus_rows = consensus
        .iter()
        .map(|c| {
            format!(
                "- {}: avg {:.1}, stddev {:.2}, agreement {}",
                c.criterion, c.average, c.stddev, c.agreement
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts::consolidation_prompt(&content, &reviews, &consensus_rows);
    let Some(reply) = ctx
        .gateway
        .query_one(&consolidator, &prompt, ctx.timeout)
        .await
    else {
        return ctx.fatal("consolidation", "consolidator did not respond");
    };
    ctx.stages.push(
        StageRecord::new("consolidation", &reply.content)
            .model(&consolidator)
            .role("consolidator")
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "consolidation",
        &ConsolidationPayload {
            model: &consolidator,
            response: &reply.content,
            reviewers: reports.len(),
        },
    );
    RunOutcome::Completed
}
