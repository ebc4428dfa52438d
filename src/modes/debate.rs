//! Debate: round 1 → revision → vote → winner.
//!
//! The vote runs over revised responses under a fresh shuffled label map —
//! never the round-1 map — to defeat position bias. There is no chairman:
//! ties break alphabetically by label.

use serde::Serialize;

use crate::aggregate::plurality;
use crate::labels::LabelMap;
use crate::modes::{RunContext, RunOutcome, collect_initial};
use crate::parsers::debate::{Revision, parse_revision};
use crate::parsers::vote::parse_vote;
use crate::prompts;
use crate::stages::StageRecord;

#[derive(Serialize)]
struct RoundSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct RevisionEntry<'a> {
    model: &'a str,
    decision: &'a str,
    parse_success: bool,
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
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    ctx.phase_start("round1");
    let initial = collect_initial(ctx, "round1").await;
    if initial.len() < 2 {
        return ctx.fatal("round1", "need at least 2 debaters");
    }
    ctx.phase_complete(
        "round1",
        &RoundSummary {
            succeeded: initial.len(),
            failed: ctx.models.len() - initial.len(),
        },
    );

    // Revision: each debater sees its own original plus peers' anonymized
    // responses, and decides REVISE | STAND | MERGE.
    ctx.phase_start("revision");
    let survivors: Vec<String> = initial.iter().map(|r| r.model.clone()).collect();
    let round1_map = LabelMap::new(&survivors);

    let revision_calls = initial.iter().map(|debater| {
        let peers: Vec<(String, String)> = initial
            .iter()
            .filter(|other| other.model != debater.model)
            .map(|other| {
                let label = round1_map
                    .label_for(&other.model)
                    .unwrap_or_default()
                    .to_string();
                (label, other.response.clone())
            })
            .collect();
        let prompt = prompts::debate_revision_prompt(&ctx.question, &debater.response, &peers);
        let gateway = ctx.gateway.clone();
        let timeout = ctx.timeout;
        async move {
            let reply = gateway.query_one(&debater.model, &prompt, timeout).await;
            (debater, reply)
        }
    });
    let revision_replies = futures_util::future::join_all(revision_calls).await;

    let mut revisions: Vec<(String, Revision)> = Vec::new();
    let mut entries: Vec<RevisionEntry> = Vec::new();
    for (debater, reply) in &revision_replies {
        let revision = match reply {
            Some(r) => {
                let parsed = parse_revision(&r.content, &debater.response);
                ctx.stages.push(
                    StageRecord::new("revision", &r.content)
                        .model(&debater.model)
                        .parsed(&parsed)
                        .time_ms(r.response_time_ms),
                );
                parsed
            }
            None => {
                // Transport failure: the original carries forward.
                tracing::warn!(model = %debater.model, "revision call failed — original stands");
                parse_revision("", &debater.response)
            }
        };
        revisions.push((debater.model.clone(), revision));
    }
    for (model, revision) in &revisions {
        entries.push(RevisionEntry {
            model: model.as_str(),
            decision: revision.decision.as_str(),
            parse_success: revision.parse_success,
        });
    }
    ctx.phase_complete("revision", &serde_json::json!({ "revisions": entries }));

    // Vote over revised responses, under a fresh shuffled permutation.
    ctx.phase_start("vote");
    let round2_map = LabelMap::shuffled(&survivors, &mut rand::rng());
    let anonymized: Vec<(String, String)> = round2_map
        .iter()
        .map(|(label, model)| {
            let text = revisions
                .iter()
                .find(|(m, _)| m == model)
                .map(|(_, rev)| rev.revised.clone())
                .unwrap_or_default();
            (label.to_string(), text)
        })
        .collect();

    let prompt = prompts::vote_prompt(&ctx.question, &anonymized);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut ballots: Vec<String> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let parsed = parse_vote(&reply.content).filter(|l| round2_map.model_for(l).is_some());
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

    // Winner: ties (two-way or three-way) fall through to the
    // alphabetically first label; the output is the revised response.
    let winner_label = tally.winners[0].clone();
    let Some(winner_model) = round2_map.model_for(&winner_label).map(str::to_string) else {
        return ctx.fatal("winner", "winning label did not resolve to a model");
    };
    let winner_text = revisions
        .iter()
        .find(|(m, _)| m == &winner_model)
        .map(|(_, rev)| rev.revised.clone())
        .unwrap_or_default();

    ctx.phase_start("winner");
    ctx.phase_complete(
        "winner",
        &WinnerPayload {
            label: &winner_label,
            model: &winner_model,
            response: &winner_text,
        },
    );
    RunOutcome::Completed
}
