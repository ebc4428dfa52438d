//! Chain: strictly sequential `{model, mandate}` steps.
//!
//! A failed step is skipped, never retried; its mandate is deferred and
//! shown to the next successful step. Step 1 failing is fatal.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::prompts;
use crate::request::ChainStep;
use crate::stages::StageRecord;

#[derive(Serialize)]
struct StepPayload<'a> {
    step: usize,
    model: &'a str,
    mandate: &'a str,
    succeeded: bool,
}

#[derive(Serialize)]
struct ChainSummary<'a> {
    steps_run: usize,
    steps_failed: usize,
    deferred_mandates: &'a [String],
    response: &'a str,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    let steps = resolve_steps(ctx);
    let mut current: Option<String> = None;
    let mut deferred: Vec<String> = Vec::new();
    let mut failed = 0usize;

    for (index, step) in steps.iter().enumerate() {
        let step_number = index + 1;
        ctx.phase_start("step");

        let prompt = if let Some(ref previous) = current {
            prompts::chain_step_prompt(&ctx.question, &step.mandate, previous, &deferred)
        } else {
            prompts::chain_draft_prompt(&ctx.question, &step.mandate)
        };

        match ctx.gateway.query_one(&step.model, &prompt, ctx.timeout).await {
            Some(reply) => {
                ctx.stages.push(
                    StageRecord::new("step", &reply.content)
                        .model(&step.model)
                        .role(&step.mandate)
                        .time_ms(reply.response_time_ms),
                );
                current = Some(reply.content.clone());
                // Deferred mandates were surfaced to this step; clear them.
                deferred.clear();
                ctx.phase_complete(
                    "step",
                    &StepPayload {
                        step: step_number,
                        model: &step.model,
                        mandate: &step.mandate,
                        succeeded: true,
                    },
                );
            }
            None => {
                if index == 0 {
                    return ctx.fatal("step", "first chain step failed");
                }
                tracing::warn!(step = step_number, model = %step.model, "chain step failed — skipped");
                failed += 1;
                deferred.push(step.mandate.clone());
                ctx.phase_complete(
                    "step",
                    &StepPayload {
                        step: step_number,
                        model: &step.model,
                        mandate: &step.mandate,
                        succeeded: false,
                    },
                );
            }
        }
    }

    let Some(output) = current else {
        return ctx.fatal("chain", "no chain step produced output");
    };
    ctx.sink.emit_with(
        "chain_complete",
        &ChainSummary {
            steps_run: steps.len(),
            steps_failed: failed,
            deferred_mandates: &deferred,
            response: &output,
        },
    );
    RunOutcome::Completed
}

/// Configured steps, or a default pipeline over the participant models:
/// the first step drafts, later steps refine.
fn resolve_steps(ctx: &RunContext) -> Vec<ChainStep> {
    if let Some(ref steps) = ctx.config.steps
        && !steps.is_empty()
    {
        return steps.clone();
    }
    ctx.models
        .iter()
        .enumerate()
        .map(|(i, model)| ChainStep {
            model: model.clone(),
            mandate: if i == 0 {
                "Draft the initial response".to_string()
            } else {
                "Critique the previous output and produce an improved version".to_string()
            },
        })
        .collect()
}
