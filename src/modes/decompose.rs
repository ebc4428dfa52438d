//! Decompose: plan → assign → execute in waves → assemble.

use std::collections::HashMap;

use serde::Serialize;

use crate::aggregate::{TopoResult, critical_path, topo_waves};
use crate::modes::{RunContext, RunOutcome};
use crate::parsers::tasks::{PlannedTask, clean_dependencies, parse_plan};
use crate::prompts;
use crate::stages::StageRecord;

const DEFAULT_MAX_TASKS: usize = 8;

#[derive(Serialize)]
struct PlanPayload<'a> {
    tasks: &'a [PlannedTask],
    waves: &'a [Vec<String>],
    flattened: bool,
}

#[derive(Serialize)]
struct WavePayload<'a> {
    wave: usize,
    tasks: &'a [String],
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct AssemblyPayload<'a> {
    response: &'a str,
    assembler_fallback: bool,
    critical_path: &'a [String],
    critical_path_ms: u64,
    parallelism_efficiency: f64,
}

struct TaskRun {
    task: PlannedTask,
    worker: String,
    output: Option<String>,
    elapsed_ms: u64,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    let max_tasks = ctx.config.max_tasks.unwrap_or(DEFAULT_MAX_TASKS).max(1);
    let planner = ctx.special_role_model();

    // Plan, with one strict-DAG retry if the planner emits a cycle.
    ctx.phase_start("plan");
    let Some((mut tasks, waves, flattened)) = make_plan(ctx, &planner, max_tasks).await else {
        return ctx.fatal("plan", "planner produced no usable plan");
    };
    ctx.phase_complete(
        "plan",
        &PlanPayload {
            tasks: &tasks,
            waves: &waves,
            flattened,
        },
    );

    // Assign: round-robin over the worker models in wave-iteration order.
    let mut assignment: HashMap<String, String> = HashMap::new();
    let mut cursor = 0usize;
    for wave in &waves {
        for task_id in wave {
            assignment.insert(task_id.clone(), ctx.models[cursor % ctx.models.len()].clone());
            cursor += 1;
        }
    }

    // Execute: waves strictly in order, tasks within a wave in parallel.
    let execute_started = std::time::Instant::now();
    let mut runs: Vec<TaskRun> = Vec::new();
    for (wave_index, wave) in waves.iter().enumerate() {
        ctx.phase_start("wave");
        let calls = wave.iter().filter_map(|task_id| {
            let task = tasks.iter().find(|t| t.id == *task_id)?.clone();
            let worker = assignment.get(task_id).cloned().unwrap_or_default();
            let predecessors = predecessor_block(&task, &runs);
            let prompt = prompts::worker_prompt(&ctx.question, &task, &predecessors);
            let gateway = ctx.gateway.clone();
            let timeout = ctx.timeout;
            Some(async move {
                let reply = gateway.query_one(&worker, &prompt, timeout).await;
                (task, worker, reply)
            })
        });
        let results = futures_util::future::join_all(calls).await;

        let mut succeeded = 0usize;
        for (task, worker, reply) in results {
            match reply {
                Some(r) => {
                    succeeded += 1;
                    ctx.stages.push(
                        StageRecord::new("task", &r.content)
                            .model(&worker)
                            .role(&task.id)
                            .time_ms(r.response_time_ms),
                    );
                    runs.push(TaskRun {
                        task,
                        worker,
                        output: Some(r.content),
                        elapsed_ms: r.response_time_ms,
                    });
                }
                None => {
                    // A failed task does not block its wave; the assembler
                    // sees the gap explicitly.
                    tracing::warn!(task = %task.id, %worker, "task failed");
                    runs.push(TaskRun {
                        task,
                        worker,
                        output: None,
                        elapsed_ms: 0,
                    });
                }
            }
        }
        ctx.phase_complete(
            "wave",
            &WavePayload {
                wave: wave_index + 1,
                tasks: wave,
                succeeded,
                failed: wave.len() - succeeded,
            },
        );
    }
    let total_wall_ms = execute_started.elapsed().as_millis() as u64;

    // Assemble: one call with the plan plus every task's output.
    ctx.phase_start("assemble");
    let deps = clean_dependencies(&mut tasks);
    let chain = critical_path(&waves, &deps);
    let critical_path_ms: u64 = chain
        .iter()
        .filter_map(|id| runs.iter().find(|r| r.task.id == *id))
        .map(|r| r.elapsed_ms)
        .sum();
    let task_ms_total: u64 = runs.iter().map(|r| r.elapsed_ms).sum();
    let parallelism_efficiency = if total_wall_ms == 0 {
        1.0
    } else {
        task_ms_total as f64 / total_wall_ms as f64
    };

    let plan_summary = tasks
        .iter()
        .map(|t| format!("- {}: {} (deps: {:?})", t.id, t.title, t.dependencies))
        .collect::<Vec<_>>()
        .join("\n");
    let outputs_block = runs
        .iter()
        .map(|r| match &r.output {
            Some(out) => format!("## {}: {}\n{}", r.task.id, r.task.title, out),
            None => format!("## {}: {} — FAILED (worker {})", r.task.id, r.task.title, r.worker),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let assembler = ctx.special_role_model();
    let prompt = prompts::assemble_prompt(&ctx.question, &plan_summary, &outputs_block);
    let (response, assembler_fallback) =
        match ctx.gateway.query_one(&assembler, &prompt, ctx.timeout).await {
            Some(r) => {
                ctx.stages.push(
                    StageRecord::new("assemble", &r.content)
                        .model(&assembler)
                        .role("assembler")
                        .time_ms(r.response_time_ms),
                );
                (r.content, false)
            }
            None => {
                tracing::warn!("assembler did not respond — concatenating task outputs");
                (fallback_assembly(&runs), true)
            }
        };

    ctx.phase_complete(
        "assemble",
        &AssemblyPayload {
            response: &response,
            assembler_fallback,
            critical_path: &chain,
            critical_path_ms,
            parallelism_efficiency,
        },
    );
    RunOutcome::Completed
}

/// Plan once; on a cycle, retry with the strict-DAG instruction; on a
/// second cycle, flatten every dependency (single wave).
async fn make_plan(
    ctx: &mut RunContext,
    planner: &str,
    max_tasks: usize,
) -> Option<(Vec<PlannedTask>, Vec<Vec<String>>, bool)> {
    for attempt in 0..2 {
        let prompt = if attempt == 0 {
            prompts::plan_prompt(&ctx.question, max_tasks)
        } else {
            prompts::plan_retry_prompt(&ctx.question, max_tasks)
        };
        let Some(reply) = ctx.gateway.query_one(planner, &prompt, ctx.timeout).await else {
            return None;
        };

        let mut tasks = parse_plan(&reply.content);
        ctx.stages.push(
            StageRecord::new("plan", &reply.content)
                .model(planner)
                .role("planner")
                .parsed(&tasks)
                .time_ms(reply.response_time_ms),
        );
        if tasks.is_empty() {
            continue;
        }

        // Truncate to max_tasks, then re-validate deps against survivors.
        tasks.truncate(max_tasks);
        let deps = clean_dependencies(&mut tasks);
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        match topo_waves(&ids, &deps) {
            TopoResult::Waves(waves) => return Some((tasks, waves, false)),
            TopoResult::Cycle { remaining, .. } => {
                tracing::warn!(attempt, ?remaining, "plan dependency cycle");
                if attempt == 1 {
                    // Recovery, not fatal: drop every dependency.
                    for task in &mut tasks {
                        task.dependencies.clear();
                    }
                    let single_wave = vec![ids];
                    return Some((tasks, single_wave, true));
                }
            }
        }
    }
    None
}

fn predecessor_block(task: &PlannedTask, runs: &[TaskRun]) -> String {
    if task.dependencies.is_empty() {
        return "none".to_string();
    }
    task.dependencies
        .iter()
        .map(|dep| {
            match runs.iter().find(|r| r.task.id == *dep) {
                Some(TaskRun {
                    output: Some(out), ..
                }) => format!("### {dep}\n{out}"),
                _ => format!("### {dep}\n(this predecessor FAILED — account for the gap)"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn fallback_assembly(runs: &[TaskRun]) -> String {
    let mut doc: Vec<String> = runs
        .iter()
        .filter_map(|r| {
            r.output
                .as_ref()
                .map(|out| format!("## {}: {}\n{}", r.task.id, r.task.title, out))
        })
        .collect();
    let missing: Vec<String> = runs
        .iter()
        .filter(|r| r.output.is_none())
        .map(|r| format!("- {}: {}", r.task.id, r.task.title))
        .collect();
    if !missing.is_empty() {
        doc.push(format!("## Missing Sub-Tasks\n{}", missing.join("\n")));
    }
    doc.join("\n\n")
}
