//! Fact-Check: optional generate → extract claims → verify → report.

use std::collections::HashMap;

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::claims::{
    Claim, Verdict, Verification, parse_claims, parse_reliability_score, parse_verifications,
};
use crate::parsers::delphi::ConfidenceLevel;
use crate::prompts;
use crate::stages::StageRecord;

const DEFAULT_MAX_CONTENT_LENGTH: usize = 8_000;
const TRUNCATION_MARKER: &str = "\n\n[content truncated for verification]";

#[derive(Debug, Clone, Serialize)]
struct ClaimConsensus {
    claim_number: usize,
    claim: String,
    verdict: Verdict,
    confidence: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    correction: Option<String>,
    votes: usize,
}

#[derive(Serialize)]
struct ExtractSummary {
    claims: usize,
}

#[derive(Serialize)]
struct VerifySummary<'a> {
    checkers: usize,
    consensus: &'a [ClaimConsensus],
}

#[derive(Serialize)]
struct ReportPayload<'a> {
    response: &'a str,
    reliability_score: Option<f64>,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    let generator = ctx
        .config
        .generator_model
        .clone()
        .or_else(|| ctx.models.first().cloned())
        .unwrap_or_default();
    let needs_generation = ctx.config.content_to_check.is_none();

    // Bias hint: the generator grading its own homework is worth flagging,
    // not failing.
    let bias = needs_generation && ctx.models.contains(&generator);
    let warning = bias.then(|| {
        format!("generator model {generator} is also a checker — results may be biased")
    });
    ctx.emit_start_with_warning(warning.as_deref());

    // Content: user-supplied, or generated; generator failure falls back to
    // the question itself.
    let mut content = match ctx.config.content_to_check.clone() {
        Some(supplied) => supplied,
        None => {
            ctx.phase_start("generate");
            let prompt = prompts::factcheck_generate_prompt(&ctx.question);
            let content = match ctx.gateway.query_one(&generator, &prompt, ctx.timeout).await {
                Some(reply) => {
                    ctx.stages.push(
                        StageRecord::new("generate", &reply.content)
                            .model(&generator)
                            .role("generator")
                            .time_ms(reply.response_time_ms),
                    );
                    reply.content
                }
                None => {
                    tracing::warn!("generator did not respond — checking the question text");
                    ctx.question.clone()
                }
            };
            ctx.phase_complete("generate", &serde_json::json!({ "model": generator }));
            content
        }
    };

    let max_len = ctx
        .config
        .max_content_length
        .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH);
    if content.len() > max_len {
        let mut boundary = max_len;
        while boundary > 0 && !content.is_char_boundary(boundary) {
            boundary -= 1;
        }
        content.truncate(boundary);
        content.push_str(TRUNCATION_MARKER);
    }

    // Extract claims.
    ctx.phase_start("extract");
    let extractor = ctx.special_role_model();
    let prompt = prompts::extract_prompt(&content);
    let Some(reply) = ctx.gateway.query_one(&extractor, &prompt, ctx.timeout).await else {
        return ctx.fatal("extract", "claim extractor did not respond");
    };
    let claims = parse_claims(&reply.content);
    ctx.stages.push(
        StageRecord::new("extract", &reply.content)
            .model(&extractor)
            .role("extractor")
            .parsed(&claims)
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "extract",
        &ExtractSummary {
            claims: claims.len(),
        },
    );

    // Nothing verifiable: skip verification, report with a null score.
    if claims.is_empty() {
        ctx.phase_start("report");
        let response = "No verifiable claims were found in the content.".to_string();
        ctx.phase_complete(
            "report",
            &ReportPayload {
                response: &response,
                reliability_score: None,
            },
        );
        return RunOutcome::Completed;
    }

    // Verify: checkers in parallel; a claim a checker skipped becomes a
    // synthesized UNVERIFIABLE entry for that checker.
    ctx.phase_start("verify");
    let prompt = prompts::verify_prompt(&content, &claims);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut per_checker: Vec<Vec<Verification>> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let mut verifications = parse_verifications(&reply.content);
        for claim in &claims {
            if !verifications.iter().any(|v| v.claim_number == claim.number) {
                verifications.push(Verification {
                    claim_number: claim.number,
                    verdict: Verdict::Unverifiable,
                    evidence: "Checker did not address this claim".to_string(),
                    correction: None,
                    confidence: ConfidenceLevel::Low,
                });
            }
        }
        ctx.stages.push(
            StageRecord::new("verify", &reply.content)
                .model(&model)
                .role("checker")
                .parsed(&verifications)
                .time_ms(reply.response_time_ms),
        );
        per_checker.push(verifications);
    }
    if per_checker.is_empty() {
        return ctx.fatal("verify", "no checker responded");
    }

    let consensus: Vec<ClaimConsensus> = claims
        .iter()
        .map(|c| claim_consensus(c, &per_checker))
        .collect();
    ctx.phase_complete(
        "verify",
        &VerifySummary {
            checkers: per_checker.len(),
            consensus: &consensus,
        },
    );

    // Report.
    ctx.phase_start("report");
    let reporter = ctx.special_role_model();
    let consensus_rows = consensus
        .iter()
        .map(|c| {
            let correction = c
                .correction
                .as_deref()
                .map(|corr| format!(" — correction: {corr}"))
                .unwrap_or_default();
            format!(
                "- claim_{}: {} → {} ({:?} confidence, {} votes){}",
                c.claim_number,
                c.claim,
                c.verdict.as_str(),
                c.confidence,
                c.votes,
                correction
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts::report_prompt(&ctx.question, &consensus_rows);
    let Some(reply) = ctx.gateway.query_one(&reporter, &prompt, ctx.timeout).await else {
        return ctx.fatal("report", "reporter did not respond");
    };
    let score = parse_reliability_score(&reply.content);
    ctx.stages.push(
        StageRecord::new("report", &reply.content)
            .model(&reporter)
            .role("reporter")
            .parsed(&serde_json::json!({ "reliability_score": score }))
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "report",
        &ReportPayload {
            response: &reply.content,
            reliability_score: score,
        },
    );
    RunOutcome::Completed
}

/// Conservative per-claim consensus:
/// clear majority wins; a VERIFIED/DISPUTED tie goes DISPUTED; a tie
/// involving UNVERIFIABLE goes to the other verdict; a three-way tie goes
/// DISPUTED.
fn claim_consensus(claim: &Claim, per_checker: &[Vec<Verification>]) -> ClaimConsensus {
    let votes: Vec<&Verification> = per_checker
        .iter()
        .filter_map(|vs| vs.iter().find(|v| v.claim_number == claim.number))
        .collect();

    let counts = crate::aggregate::tally(votes.iter().map(|v| v.verdict));
    let (winners, _) = crate::aggregate::leaders(&counts);
    let verdict = match winners.as_slice() {
        [single] => *single,
        [a, b] => {
            if *a == Verdict::Unverifiable {
                *b
            } else if *b == Verdict::Unverifiable {
                *a
            } else {
                Verdict::Disputed
            }
        }
        _ => Verdict::Disputed,
    };

    // Consensus confidence: mode of confidences among checkers that voted
    // the consensus verdict.
    let agreeing: Vec<&&Verification> = votes.iter().filter(|v| v.verdict == verdict).collect();
    let confidence_counts = crate::aggregate::tally(agreeing.iter().map(|v| v.confidence));
    let confidence = confidence_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(c, _)| c)
        .unwrap_or(ConfidenceLevel::Low);

    // Consensus correction, only for DISPUTED: most frequent non-null
    // correction among DISPUTED voters.
    let correction = if verdict == Verdict::Disputed {
        let mut correction_counts: HashMap<&str, usize> = HashMap::new();
        for v in votes.iter().filter(|v| v.verdict == Verdict::Disputed) {
            if let Some(ref corr) = v.correction {
                *correction_counts.entry(corr.as_str()).or_insert(0) += 1;
            }
        }
        correction_counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(c, _)| c.to_string())
    } else {
        None
    };

    ClaimConsensus {
        claim_number: claim.number,
        claim: claim.text.clone(),
        verdict,
        confidence,
        correction,
        votes: votes.len(),
    }
}
