//! Tournament: collect → bracket seeding → matchup rounds → winner.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome, collect_initial};
use crate::parsers::tournament::{MatchupSide, parse_matchup_winner};
use crate::prompts;
use crate::stages::{Stage1Response, StageRecord};

#[derive(Debug, Clone, Serialize)]
struct MatchupResult {
    round: usize,
    contestant_a: String,
    /// None for a bye.
    contestant_b: Option<String>,
    winner: String,
    /// True when the winner came from a default rule (judge failure or
    /// unparseable verdict), not a judged decision.
    was_default: bool,
}

#[derive(Serialize)]
struct SeedingPayload<'a> {
    contestants: &'a [String],
    rounds: usize,
}

#[derive(Serialize)]
struct RoundPayload<'a> {
    round: usize,
    matchups: &'a [MatchupResult],
}

#[derive(Serialize)]
struct BracketStep<'a> {
    round: usize,
    opponent: Option<&'a str>,
    result: &'a str,
}

#[derive(Serialize)]
struct ChampionPayload<'a> {
    model: &'a str,
    response: &'a str,
    bracket_path: Vec<BracketStep<'a>>,
    total_matchups: usize,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    ctx.phase_start("collect");
    let initial = collect_initial(ctx, "collect").await;
    if initial.len() < 2 {
        return ctx.fatal("collect", "need at least 2 contestants");
    }
    ctx.phase_complete(
        "collect",
        &serde_json::json!({ "succeeded": initial.len(), "failed": ctx.models.len() - initial.len() }),
    );

    // Seeding: contestants in collection order; ⌈log₂(N)⌉ rounds.
    ctx.phase_start("seeding");
    let contestants: Vec<String> = initial.iter().map(|r| r.model.clone()).collect();
    let total_rounds = usize::BITS as usize - (initial.len() - 1).leading_zeros() as usize;
    ctx.phase_complete(
        "seeding",
        &SeedingPayload {
            contestants: &contestants,
            rounds: total_rounds,
        },
    );

    let judge = ctx
        .config
        .judge_model
        .clone()
        .unwrap_or_else(|| ctx.special_role_model());

    let mut alive: Vec<Stage1Response> = initial.clone();
    let mut history: Vec<MatchupResult> = Vec::new();
    let mut round = 0usize;

    while alive.len() > 1 {
        round += 1;
        ctx.phase_start("matchups");

        // Pair (0,1), (2,3), …; an odd tail gets a bye that auto-advances.
        let pairs: Vec<(Stage1Response, Option<Stage1Response>)> = alive
            .chunks(2)
            .map(|c| (c[0].clone(), c.get(1).cloned()))
            .collect();

        let calls = pairs.iter().map(|(a, b)| {
            let gateway = ctx.gateway.clone();
            let judge = judge.clone();
            let question = ctx.question.clone();
            let timeout = ctx.timeout;
            async move {
                match b {
                    None => Judged::Bye,
                    Some(b) => judge_matchup(&gateway, &judge, &question, a, b, timeout).await,
                }
            }
        });
        let outcomes = futures_util::future::join_all(calls).await;

        let mut next_round: Vec<Stage1Response> = Vec::new();
        let mut round_results: Vec<MatchupResult> = Vec::new();
        for ((a, b), judged) in pairs.iter().zip(outcomes) {
            let result = match judged {
                Judged::Bye => {
                    next_round.push(a.clone());
                    MatchupResult {
                        round,
                        contestant_a: a.model.clone(),
                        contestant_b: None,
                        winner: a.model.clone(),
                        was_default: false,
                    }
                }
                Judged::Decided {
                    side,
                    was_default,
                    transcript,
                } => {
                    let b = b.as_ref().expect("decided matchup has two contestants");
                    let winner = match side {
                        MatchupSide::A => a.clone(),
                        MatchupSide::B => b.clone(),
                    };
                    if let Some((content, ms)) = transcript {
                        ctx.stages.push(
                            StageRecord::new("matchup", &content)
                                .model(&judge)
                                .role("judge")
                                .parsed(&serde_json::json!({
                                    "round": round,
                                    "winner": winner.model,
                                    "wasDefault": was_default,
                                }))
                                .time_ms(ms),
                        );
                    }
                    next_round.push(winner.clone());
                    MatchupResult {
                        round,
                        contestant_a: a.model.clone(),
                        contestant_b: Some(b.model.clone()),
                        winner: winner.model.clone(),
                        was_default,
                    }
                }
            };
            round_results.push(result);
        }
        ctx.phase_complete(
            "matchups",
            &RoundPayload {
                round,
                matchups: &round_results,
            },
        );
        history.extend(round_results);
        alive = next_round;
    }

    // Champion: the unmodified original response, plus its bracket path.
    ctx.phase_start("winner");
    let champion = alive.remove(0);
    let bracket_path: Vec<BracketStep> = history
        .iter()
        .filter(|m| m.winner == champion.model)
        .map(|m| BracketStep {
            round: m.round,
            opponent: match (&m.contestant_b, m.contestant_a == champion.model) {
                (None, _) => None,
                (Some(b), true) => Some(b.as_str()),
                (Some(_), false) => Some(m.contestant_a.as_str()),
            },
            result: if m.contestant_b.is_none() { "bye" } else { "won" },
        })
        .collect();
    let total_matchups = history.iter().filter(|m| m.contestant_b.is_some()).count();
    ctx.phase_complete(
        "winner",
        &ChampionPayload {
            model: &champion.model,
            response: &champion.response,
            bracket_path,
            total_matchups,
        },
    );
    RunOutcome::Completed
}

enum Judged {
    Bye,
    Decided {
        side: MatchupSide,
        was_default: bool,
        /// Judge transcript and latency, when a judged reply existed.
        transcript: Option<(String, u64)>,
    },
}

/// Judge one matchup. Query failure retries once, then default-advances A.
/// Parse failure retries once with a strict format prompt, then picks a
/// uniformly random side flagged `was_default`.
async fn judge_matchup(
    gateway: &std::sync::Arc<dyn crate::gateway::ModelGateway>,
    judge: &str,
    question: &str,
    a: &Stage1Response,
    b: &Stage1Response,
    timeout: std::time::Duration,
) -> Judged {
    let prompt = prompts::matchup_prompt(question, &a.response, &b.response);

    let mut reply = gateway.query_one(judge, &prompt, timeout).await;
    if reply.is_none() {
        reply = gateway.query_one(judge, &prompt, timeout).await;
    }
    let Some(reply) = reply else {
        tracing::warn!(judge, "judge unreachable — default-advancing contestant A");
        return Judged::Decided {
            side: MatchupSide::A,
            was_default: true,
            transcript: None,
        };
    };

    if let Some(side) = parse_matchup_winner(&reply.content) {
        return Judged::Decided {
            side,
            was_default: false,
            transcript: Some((reply.content, reply.response_time_ms)),
        };
    }

    // Strict-format retry.
    let strict = prompts::matchup_strict_prompt(question, &a.response, &b.response);
    if let Some(retry) = gateway.query_one(judge, &strict, timeout).await
        && let Some(side) = parse_matchup_winner(&retry.content)
    {
        return Judged::Decided {
            side,
            was_default: false,
            transcript: Some((retry.content, retry.response_time_ms)),
        };
    }

    tracing::warn!(judge, "verdict unparseable twice — picking a random side");
    let side = if rand::random::<bool>() {
        MatchupSide::A
    } else {
        MatchupSide::B
    };
    Judged::Decided {
        side,
        was_default: true,
        transcript: Some((reply.content, reply.response_time_ms)),
    }
}
