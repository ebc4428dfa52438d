//! Specialist Panel: role-templated specialists in parallel → synthesis.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::panel::{SpecialistReport, parse_report};
use crate::prompts;
use crate::request::SpecialistRole;
use crate::stages::StageRecord;

/// Library roles used when the request names none; assigned round-robin.
fn role_library() -> Vec<SpecialistRole> {
    [
        (
            "Strategist",
            "long-term direction, tradeoffs, and opportunity cost",
        ),
        (
            "Risk Analyst",
            "failure modes, edge cases, and what could go wrong",
        ),
        (
            "Implementer",
            "feasibility, effort, and the concrete path to delivery",
        ),
        (
            "User Advocate",
            "end-user experience, clarity, and real-world usability",
        ),
        (
            "Domain Expert",
            "technical depth, correctness, and state of the art",
        ),
    ]
    .into_iter()
    .map(|(name, focus)| SpecialistRole {
        name: name.to_string(),
        focus: focus.to_string(),
    })
    .collect()
}

#[derive(Serialize)]
struct SpecialistPayload<'a> {
    model: &'a str,
    role: &'a str,
    report: &'a SpecialistReport,
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    model: &'a str,
    response: &'a str,
    specialists: usize,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    let library = role_library();
    let roles: Vec<SpecialistRole> = match ctx.config.roles {
        Some(ref custom) if !custom.is_empty() => custom.clone(),
        _ => library,
    };

    // Specialists: each model is paired with a role that fixes its lens.
    ctx.phase_start("specialists");
    let assignments: Vec<(String, SpecialistRole)> = ctx
        .models
        .iter()
        .enumerate()
        .map(|(i, model)| (model.clone(), roles[i % roles.len()].clone()))
        .collect();

    let calls = assignments.iter().map(|(model, role)| {
        let prompt = prompts::specialist_prompt(&ctx.question, role);
        let gateway = ctx.gateway.clone();
        let timeout = ctx.timeout;
        async move {
            let reply = gateway.query_one(model, &prompt, timeout).await;
            (model, role, reply)
        }
    });
    let results = futures_util::future::join_all(calls).await;

    let mut reports: Vec<(String, String, String)> = Vec::new();
    for (model, role, reply) in results {
        let Some(reply) = reply else {
            tracing::warn!(%model, role = %role.name, "specialist did not respond");
            continue;
        };
        let report = parse_report(&reply.content);
        ctx.stages.push(
            StageRecord::new("specialist", &reply.content)
                .model(model)
                .role(&role.name)
                .parsed(&report)
                .time_ms(reply.response_time_ms),
        );
        ctx.sink.emit_with(
            "specialist_report",
            &SpecialistPayload {
                model,
                role: &role.name,
                report: &report,
            },
        );
        reports.push((model.clone(), role.name.clone(), reply.content.clone()));
    }
    if reports.len() < 2 {
        return ctx.fatal("specialists", "fewer than 2 specialists responded");
    }
    ctx.phase_complete(
        "specialists",
        &serde_json::json!({ "succeeded": reports.len(), "failed": ctx.models.len() - reports.len() }),
    );

    // Synthesis.
    ctx.phase_start("synthesis");
    let synthesizer = ctx.special_role_model();
    let prompt = prompts::panel_synthesis_prompt(&ctx.question, &reports);
    let Some(reply) = ctx.gateway.query_one(&synthesizer, &prompt, ctx.timeout).await else {
        return ctx.fatal("synthesis", "synthesizer did not respond");
    };
    ctx.stages.push(
        StageRecord::new("synthesis", &reply.content)
            .model(&synthesizer)
            .role("synthesizer")
            .time_ms(reply.response_time_ms),
    );
    ctx.phase_complete(
        "synthesis",
        &SynthesisPayload {
            model: &synthesizer,
            response: &reply.content,
            specialists: reports.len(),
        },
    );
    RunOutcome::Completed
}
