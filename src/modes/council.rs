//! Council: collect → rank → synthesize.

use serde::Serialize;

use crate::labels::LabelMap;
use crate::modes::{RunContext, RunOutcome, collect_initial};
use crate::parsers::ranking::{aggregate_rankings, parse_ranking};
use crate::prompts;
use crate::stages::{ConversationTurn, StageRecord};

#[derive(Serialize)]
struct CollectSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct RankEntry {
    model: String,
    average_rank: f64,
}

#[derive(Serialize)]
struct RankSummary<'a> {
    rankings: &'a [RankEntry],
    raters: usize,
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    model: &'a str,
    response: &'a str,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Collect: fan the question out; keep non-empty replies.
    ctx.phase_start("collect");
    let initial = collect_initial(ctx, "collect").await;
    if initial.is_empty() {
        return ctx.fatal("collect", "no council model produced a response");
    }
    ctx.phase_complete(
        "collect",
        &CollectSummary {
            succeeded: initial.len(),
            failed: ctx.models.len() - initial.len(),
        },
    );

    // Rank: every council model rates the anonymized set.
    ctx.phase_start("rank");
    let survivors: Vec<String> = initial.iter().map(|r| r.model.clone()).collect();
    let map = LabelMap::new(&survivors);
    let anonymized: Vec<(String, String)> = initial
        .iter()
        .enumerate()
        .map(|(i, r)| (crate::labels::response_label(i), r.response.clone()))
        .collect();

    let prompt = prompts::ranking_prompt(&ctx.question, &anonymized);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut rankings: Vec<Vec<String>> = Vec::new();
    for model in ctx.models.clone() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let ranking = parse_ranking(&reply.content, &map);
        ctx.stages.push(
            StageRecord::new("rank", &reply.content)
                .model(&model)
                .parsed(&ranking)
                .time_ms(reply.response_time_ms),
        );
        if !ranking.is_empty() {
            rankings.push(ranking);
        }
    }
    let aggregate: Vec<RankEntry> = aggregate_rankings(&rankings, &map)
        .into_iter()
        .map(|(model, average_rank)| RankEntry {
            model,
            average_rank,
        })
        .collect();
    ctx.phase_complete(
        "rank",
        &RankSummary {
            rankings: &aggregate,
            raters: rankings.len(),
        },
    );

    // Synthesize: one chairman call over both stages. Multi-turn history is
    // passed as prior turns; the output is the chairman's text, unmodified.
    ctx.phase_start("synthesize");
    let chairman = ctx.special_role_model();
    let ranking_pairs: Vec<(String, f64)> = aggregate
        .iter()
        .map(|e| (e.model.clone(), e.average_rank))
        .collect();
    let synthesis_prompt =
        prompts::council_synthesis_prompt(&ctx.question, &anonymized, &ranking_pairs);

    let reply = if ctx.history.is_empty() {
        ctx.gateway
            .query_one(&chairman, &synthesis_prompt, ctx.timeout)
            .await
    } else {
        let mut turns = ctx.history.clone();
        turns.push(ConversationTurn::user(&synthesis_prompt));
        ctx.gateway
            .query_one_with_messages(&chairman, &turns, ctx.timeout)
            .await
    };

    let Some(reply) = reply else {
        return ctx.fatal("synthesize", "chairman did not respond");
    };
    ctx.stages.push(
        StageRecord::new("synthesize", &reply.content)
            .model(&chairman)
            .role("chairman")
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "synthesize",
        &SynthesisPayload {
            model: &chairman,
            response: &reply.content,
        },
    );
    RunOutcome::Completed
}
