//! Brainstorm: ideate → cluster → score → refine.

use std::collections::HashMap;

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::ideas::{
    Cluster, ClusterScore, Idea, clusters_by_source, parse_cluster_scores, parse_clusters,
    parse_ideas,
};
use crate::prompts;
use crate::stages::StageRecord;

const DEFAULT_MAX_CLUSTERS: usize = 5;

#[derive(Serialize)]
struct IdeateSummary {
    ideas: usize,
    contributors: usize,
}

#[derive(Serialize)]
struct ClusterSummary<'a> {
    clusters: &'a [Cluster],
    unclustered: &'a [String],
    fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ScoredCluster {
    number: usize,
    name: String,
    novelty: f64,
    feasibility: f64,
    impact: f64,
    total: f64,
}

#[derive(Serialize)]
struct ScorePayload<'a> {
    scores: &'a [ScoredCluster],
    scorers: usize,
    by_promise: bool,
}

#[derive(Serialize)]
struct RefinePayload<'a> {
    winners: &'a [String],
    response: &'a str,
    refiner_fallback: bool,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Ideate: all models brainstorm in parallel.
    ctx.phase_start("ideate");
    let prompt = prompts::ideate_prompt(&ctx.question);
    let replies = ctx.gateway.query_many(&ctx.models, &prompt, ctx.timeout).await;

    let mut ideas: Vec<Idea> = Vec::new();
    let mut contributors = 0usize;
    for (index, model) in ctx.models.clone().into_iter().enumerate() {
        let Some(reply) = replies.get(&model) else {
            continue;
        };
        let parsed = parse_ideas(&reply.content, index);
        ctx.stages.push(
            StageRecord::new("ideate", &reply.content)
                .model(&model)
                .parsed(&parsed)
                .time_ms(reply.response_time_ms),
        );
        if !parsed.is_empty() {
            contributors += 1;
        }
        ideas.extend(parsed);
    }
    if ideas.is_empty() {
        return ctx.fatal("ideate", "no ideas were generated");
    }
    ctx.phase_complete(
        "ideate",
        &IdeateSummary {
            ideas: ideas.len(),
            contributors,
        },
    );

    // Cluster: the curator groups ideas into themes.
    ctx.phase_start("cluster");
    let configured_cap = ctx.config.max_clusters.unwrap_or(DEFAULT_MAX_CLUSTERS);
    // A thin brainstorm cannot sustain many clusters.
    let max_clusters = if ideas.len() < 10 {
        configured_cap.min((ideas.len() / 2).max(3))
    } else {
        configured_cap
    };

    let curator = ctx.special_role_model();
    let known_ids: Vec<String> = ideas.iter().map(|i| i.id.clone()).collect();
    let cluster_prompt = prompts::cluster_prompt(&ctx.question, &ideas, max_clusters);
    let (mut clusters, cluster_fallback) = match ctx
        .gateway
        .query_one(&curator, &cluster_prompt, ctx.timeout)
        .await
    {
        Some(reply) => {
            let parsed = parse_clusters(&reply.content, &known_ids);
            ctx.stages.push(
                StageRecord::new("cluster", &reply.content)
                    .model(&curator)
                    .role("curator")
                    .parsed(&parsed)
                    .time_ms(reply.response_time_ms),
            );
            if parsed.is_empty() {
                (clusters_by_source(&ideas), true)
            } else {
                (parsed, false)
            }
        }
        None => {
            tracing::warn!("curator did not respond — grouping ideas by source model");
            (clusters_by_source(&ideas), true)
        }
    };
    clusters.truncate(max_clusters.max(1));

    let clustered_ids: Vec<&String> = clusters.iter().flat_map(|c| c.idea_ids.iter()).collect();
    let unclustered: Vec<String> = known_ids
        .iter()
        .filter(|id| !clustered_ids.contains(id))
        .cloned()
        .collect();
    ctx.phase_complete(
        "cluster",
        &ClusterSummary {
            clusters: &clusters,
            unclustered: &unclustered,
            fallback: cluster_fallback,
        },
    );

    // Score: skipped outright when a single cluster exists.
    let winners: Vec<usize> = if clusters.len() == 1 {
        vec![clusters[0].number]
    } else {
        ctx.phase_start("score");
        let score_prompt = prompts::score_prompt(&ctx.question, &clusters);
        let replies = ctx
            .gateway
            .query_many(&ctx.models, &score_prompt, ctx.timeout)
            .await;

        let mut per_scorer: Vec<HashMap<usize, ClusterScore>> = Vec::new();
        for model in ctx.models.clone() {
            let Some(reply) = replies.get(&model) else {
                continue;
            };
            let scores = parse_cluster_scores(&reply.content);
            ctx.stages.push(
                StageRecord::new("score", &reply.content)
                    .model(&model)
                    .role("scorer")
                    .parsed(&scores)
                    .time_ms(reply.response_time_ms),
            );
            if !scores.is_empty() {
                per_scorer.push(scores);
            }
        }

        let by_promise = per_scorer.len() < 2;
        let scored = if by_promise {
            // Too few valid scorers — rank by the curator's promise level.
            clusters
                .iter()
                .map(|c| ScoredCluster {
                    number: c.number,
                    name: c.name.clone(),
                    novelty: 0.0,
                    feasibility: 0.0,
                    impact: 0.0,
                    total: c.promise.fallback_score(),
                })
                .collect::<Vec<_>>()
        } else {
            aggregate_scores(&clusters, &per_scorer)
        };

        let top = scored
            .iter()
            .map(|s| s.total)
            .fold(f64::NEG_INFINITY, f64::max);
        // The refiner receives up to 3 tied clusters.
        let winners: Vec<usize> = scored
            .iter()
            .filter(|s| (s.total - top).abs() < 1e-9)
            .take(3)
            .map(|s| s.number)
            .collect();
        ctx.phase_complete(
            "score",
            &ScorePayload {
                scores: &scored,
                scorers: per_scorer.len(),
                by_promise,
            },
        );
        winners
    };

    // Refine: one call over the winning (and tied) clusters.
    ctx.phase_start("refine");
    let winner_names: Vec<String> = clusters
        .iter()
        .filter(|c| winners.contains(&c.number))
        .map(|c| c.name.clone())
        .collect();
    let winners_block = clusters
        .iter()
        .filter(|c| winners.contains(&c.number))
        .map(|c| render_cluster(c, &ideas))
        .collect::<Vec<_>>()
        .join("\n\n");

    let refiner = ctx.special_role_model();
    let refine_prompt = prompts::refine_prompt(&ctx.question, &winners_block);
    let (response, refiner_fallback) = match ctx
        .gateway
        .query_one(&refiner, &refine_prompt, ctx.timeout)
        .await
    {
        Some(reply) => {
            ctx.stages.push(
                StageRecord::new("refine", &reply.content)
                    .model(&refiner)
                    .role("refiner")
                    .time_ms(reply.response_time_ms),
            );
            (reply.content, false)
        }
        None => {
            tracing::warn!("refiner did not respond — emitting the winning cluster directly");
            (winners_block.clone(), true)
        }
    };
    ctx.phase_complete(
        "refine",
        &RefinePayload {
            winners: &winner_names,
            response: &response,
            refiner_fallback,
        },
    );
    RunOutcome::Completed
}

/// Per-cluster mean of each dimension across scorers that scored it.
fn aggregate_scores(
    clusters: &[Cluster],
    per_scorer: &[HashMap<usize, ClusterScore>],
) -> Vec<ScoredCluster> {
    clusters
        .iter()
        .map(|c| {
            let marks: Vec<&ClusterScore> =
                per_scorer.iter().filter_map(|s| s.get(&c.number)).collect();
            let n = marks.len().max(1) as f64;
            let novelty = marks.iter().map(|m| m.novelty).sum::<f64>() / n;
            let feasibility = marks.iter().map(|m| m.feasibility).sum::<f64>() / n;
            let impact = marks.iter().map(|m| m.impact).sum::<f64>() / n;
            ScoredCluster {
                number: c.number,
                name: c.name.clone(),
                novelty,
                feasibility,
                impact,
                total: novelty + feasibility + impact,
            }
        })
        .collect()
}

fn render_cluster(cluster: &Cluster, ideas: &[Idea]) -> String {
    let members = cluster
        .idea_ids
        .iter()
        .filter_map(|id| ideas.iter().find(|i| i.id.eq_ignore_ascii_case(id)))
        .map(|i| format!("- {}: {}", i.title, i.body))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "CLUSTER: {} (promise {:?})\nTheme: {}\n{}",
        cluster.name, cluster.promise, cluster.theme, members
    )
}
