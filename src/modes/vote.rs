//! Vote: collect → vote → optional tiebreaker → winner.

use serde::Serialize;

use crate::aggregate::plurality;
use crate::labels::LabelMap;
use crate::modes::{RunContext, RunOutcome, collect_initial};
use crate::parsers::vote::parse_vote;
use crate::prompts;
use crate::stages::{Stage1Response, StageRecord};

#[derive(Serialize)]
struct CollectSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct TallyPayload<'a> {
    counts: &'a [(String, usize)],
    voters: usize,
    is_tie: bool,
}

#[derive(Serialize)]
struct WinnerPayload<'a> {
    label: &'a str,
    model: &'a str,
    response: &'a str,
    tiebroken: bool,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    ctx.phase_start("collect");
    let initial = collect_initial(ctx, "collect").await;
    if initial.len() < 2 {
        return ctx.fatal("collect", "need at least 2 responses to hold a vote");
    }
    ctx.phase_complete(
        "collect",
        &CollectSummary {
            succeeded: initial.len(),
            failed: ctx.models.len() - initial.len(),
        },
    );

    // Vote: each model picks among the anonymized responses.
    ctx.phase_start("vote");
    let survivors: Vec<String> = initial.iter().map(|r| r.model.clone()).collect();
    let map = LabelMap::new(&survivors);
    let anonymized: Vec<(String, String)> = initial
        .iter()
        .enumerate()
        .map(|(i, r)| (crate::labels::response_label(i), r.response.clone()))
        .collect();

    let prompt = prompts::vote_prompt(&ctx.question, &anonymized);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut ballots: Vec<String> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        // Count only ballots whose label resolves inside the map.
        let parsed = parse_vote(&reply.content).filter(|l| map.model_for(l).is_some());
        ctx.stages.push(
            StageRecord::new("vote", &reply.content)
                .model(&model)
                .parsed(&parsed)
                .time_ms(reply.response_time_ms),
        );
        if let Some(label) = parsed {
            ballots.push(label);
        }
    }

    let Some(tally) = plurality(&ballots) else {
        return ctx.fatal("vote", "no ballot could be parsed");
    };
    ctx.phase_complete(
        "vote",
        &TallyPayload {
            counts: &tally.counts,
            voters: ballots.len(),
            is_tie: tally.is_tie,
        },
    );

    // Tiebreaker: one chairman call over the tied responses only; retry
    // once on parse failure; alphabetically first tied label after that.
    let mut tiebroken = false;
    let winner_label = if tally.is_tie {
        ctx.phase_start("tiebreaker");
        tiebroken = true;
        let label = break_tie(ctx, &tally.winners, &anonymized).await;
        ctx.phase_complete("tiebreaker", &serde_json::json!({ "label": label }));
        label
    } else {
        tally.winners[0].clone()
    };

    // Winner: the unmodified stage-1 response behind the winning label.
    let Some(winner) = resolve_winner(&map, &initial, &winner_label) else {
        return ctx.fatal("winner", "winning label did not resolve to a model");
    };
    ctx.phase_start("winner");
    ctx.phase_complete(
        "winner",
        &WinnerPayload {
            label: &winner_label,
            model: &winner.model,
            response: &winner.response,
            tiebroken,
        },
    );
    RunOutcome::Completed
}

fn resolve_winner<'a>(
    map: &LabelMap,
    initial: &'a [Stage1Response],
    label: &str,
) -> Option<&'a Stage1Response> {
    let model = map.model_for(label)?;
    initial.iter().find(|r| r.model == model)
}

async fn break_tie(
    ctx: &mut RunContext,
    tied: &[String],
    anonymized: &[(String, String)],
) -> String {
    let alphabetical_first = tied[0].clone(); // winners are sorted

    let tied_responses: Vec<(String, String)> = anonymized
        .iter()
        .filter(|(label, _)| tied.contains(label))
        .cloned()
        .collect();
    let chairman = ctx.special_role_model();
    let prompt = prompts::tiebreak_prompt(&ctx.question, &tied_responses);

    for attempt in 0..2 {
        let Some(reply) = ctx.gateway.query_one(&chairman, &prompt, ctx.timeout).await else {
            // Transport failure is not a parse failure — no retry.
            tracing::warn!(attempt, "tiebreak call failed — falling back to alphabetical");
            return alphabetical_first;
        };
        let parsed = parse_vote(&reply.content).filter(|l| tied.contains(l));
        ctx.stages.push(
            StageRecord::new("tiebreaker", &reply.content)
                .model(&chairman)
                .role("chairman")
                .parsed(&parsed)
                .time_ms(reply.response_time_ms),
        );
        if let Some(label) = parsed {
            return label;
        }
        tracing::warn!(attempt, "tiebreak ballot did not parse");
    }
    alphabetical_first
}
