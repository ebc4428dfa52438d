//! Jury: present → deliberation → verdict.

use std::collections::HashMap;

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::first_value;
use crate::parsers::jury::{JurorScores, JuryVerdict, majority_verdict, parse_juror};
use crate::prompts;
use crate::stages::StageRecord;

#[derive(Serialize)]
struct DimensionStat {
    dimension: String,
    mean: f64,
    min: f64,
    max: f64,
}

#[derive(Serialize)]
struct DeliberationSummary<'a> {
    jurors: usize,
    dimensions: &'a [DimensionStat],
    majority: &'a str,
}

#[derive(Serialize)]
struct VerdictPayload<'a> {
    verdict: &'a str,
    foreman: &'a str,
    response: &'a str,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Present: one model produces the answer the jury will evaluate.
    ctx.phase_start("present");
    let presenter = ctx
        .config
        .generator_model
        .clone()
        .or_else(|| ctx.models.first().cloned())
        .unwrap_or_default();
    let Some(presented) = ctx
        .gateway
        .query_one(&presenter, &ctx.question, ctx.timeout)
        .await
    else {
        return ctx.fatal("present", "presenter did not respond");
    };
    ctx.stages.push(
        StageRecord::new("present", &presented.content)
            .model(&presenter)
            .role("presenter")
            .time_ms(presented.response_time_ms),
    );
    ctx.phase_complete("present", &serde_json::json!({ "model": presenter }));

    // Deliberation: jurors score five dimensions in parallel.
    ctx.phase_start("deliberation");
    let juror_prompt = prompts::juror_prompt(&ctx.question, &presented.content);
    let replies = ctx
        .gateway
        .query_many(&ctx.models, &juror_prompt, ctx.timeout)
        .await;

    let mut juror_texts: Vec<(String, String)> = Vec::new();
    let mut scorecards: Vec<JurorScores> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let scores = parse_juror(&reply.content);
        ctx.stages.push(
            StageRecord::new("deliberation", &reply.content)
                .model(&model)
                .role("juror")
                .parsed(&scores)
                .time_ms(reply.response_time_ms),
        );
        juror_texts.push((model, reply.content.clone()));
        scorecards.push(scores);
    }
    if scorecards.len() < 2 {
        return ctx.fatal("deliberation", "fewer than 2 jurors responded");
    }

    let dimensions = dimension_stats(&scorecards);
    let verdicts: Vec<JuryVerdict> = scorecards.iter().filter_map(|s| s.verdict).collect();
    let majority = majority_verdict(&verdicts).unwrap_or(JuryVerdict::Revise);
    ctx.phase_complete(
        "deliberation",
        &DeliberationSummary {
            jurors: scorecards.len(),
            dimensions: &dimensions,
            majority: majority.as_str(),
        },
    );

    // Verdict: the foreman sees every juror's raw text plus the tally.
    ctx.phase_start("verdict");
    let foreman = ctx.special_role_model();
    let tally_summary = verdict_tally_summary(&verdicts);
    let foreman_prompt = prompts::foreman_prompt(
        &ctx.question,
        &presented.content,
        &juror_texts,
        &tally_summary,
        majority.as_str(),
    );
    let Some(reply) = ctx
        .gateway
        .query_one(&foreman, &foreman_prompt, ctx.timeout)
        .await
    else {
        return ctx.fatal("verdict", "foreman did not respond");
    };

    // Foreman's verdict line wins when it parses; the computed majority is
    // the fallback.
    let final_verdict = first_value(&reply.content, "VERDICT")
        .and_then(|v| JuryVerdict::parse(&v))
        .unwrap_or(majority);
    ctx.stages.push(
        StageRecord::new("verdict", &reply.content)
            .model(&foreman)
            .role("foreman")
            .parsed(&final_verdict)
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "verdict",
        &VerdictPayload {
            verdict: final_verdict.as_str(),
            foreman: &foreman,
            response: &reply.content,
        },
    );
    RunOutcome::Completed
}

/// Per-dimension mean and range over jurors with non-null entries.
fn dimension_stats(scorecards: &[JurorScores]) -> Vec<DimensionStat> {
    let mut by_dimension: HashMap<&str, Vec<f64>> = HashMap::new();
    for card in scorecards {
        for (dim, score) in &card.scores {
            if let Some(s) = score {
                by_dimension.entry(dim.as_str()).or_default().push(*s);
            }
        }
    }
    crate::parsers::jury::DIMENSIONS
        .iter()
        .filter_map(|dim| {
            let values = by_dimension.get(*dim)?;
            let summary = crate::aggregate::numeric_summary(values)?;
            Some(DimensionStat {
                dimension: dim.to_string(),
                mean: summary.mean,
                min: summary.min,
                max: summary.max,
            })
        })
        .collect()
}

fn verdict_tally_summary(verdicts: &[JuryVerdict]) -> String {
    let counts = crate::aggregate::tally(verdicts.iter().copied());
    let mut parts: Vec<String> = counts
        .into_iter()
        .map(|(v, c)| format!("{} x{}", v.as_str(), c))
        .collect();
    parts.sort();
    parts.join(", ")
}
