//! Red Team: generate → K cycles of attack/defend → synthesize.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::redteam::{
    Defense, DefenseVerdict, Finding, Severity, parse_defenses, parse_findings,
};
use crate::prompts;
use crate::stages::StageRecord;

const DEFAULT_ROUNDS: usize = 2;

/// One row of the accumulated audit table.
#[derive(Debug, Clone, Serialize)]
struct AuditEntry {
    round: usize,
    finding: usize,
    title: String,
    severity: Severity,
    verdict: DefenseVerdict,
}

#[derive(Serialize)]
struct AttackSummary {
    round: usize,
    findings: usize,
    by_severity: [usize; 4],
}

#[derive(Serialize)]
struct DefendSummary {
    round: usize,
    accepted: usize,
    rebutted: usize,
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    response: &'a str,
    total_findings: usize,
    accepted: usize,
    /// Highest severity observed across all rounds.
    overall_risk: Option<Severity>,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    let rounds = ctx.config.rounds.unwrap_or(DEFAULT_ROUNDS).max(1);
    let generator = ctx
        .config
        .generator_model
        .clone()
        .or_else(|| ctx.models.first().cloned())
        .unwrap_or_default();
    let attacker = ctx
        .models
        .iter()
        .find(|m| **m != generator)
        .cloned()
        .unwrap_or_else(|| generator.clone());
    let defender = generator.clone();

    // Generate: structure the input into attackable content.
    ctx.phase_start("generate");
    let prompt = prompts::redteam_generate_prompt(&ctx.question);
    let Some(generated) = ctx.gateway.query_one(&generator, &prompt, ctx.timeout).await else {
        return ctx.fatal("generate", "generator did not respond");
    };
    let mut content = generated.content.clone();
    ctx.stages.push(
        StageRecord::new("generate", &generated.content)
            .model(&generator)
            .role("generator")
            .time_ms(generated.response_time_ms),
    );
    ctx.phase_complete("generate", &serde_json::json!({ "model": generator }));

    let mut audit: Vec<AuditEntry> = Vec::new();

    for round in 1..=rounds {
        // Attack.
        ctx.phase_start("attack");
        let attack = prompts::attack_prompt(&content, round);
        let Some(reply) = ctx.gateway.query_one(&attacker, &attack, ctx.timeout).await else {
            tracing::warn!(round, "attacker did not respond — ending cycles early");
            ctx.phase_complete(
                "attack",
                &AttackSummary {
                    round,
                    findings: 0,
                    by_severity: [0; 4],
                },
            );
            break;
        };
        let findings = parse_findings(&reply.content);
        ctx.stages.push(
            StageRecord::new("attack", &reply.content)
                .model(&attacker)
                .role("attacker")
                .parsed(&findings)
                .time_ms(reply.response_time_ms),
        );
        ctx.phase_complete(
            "attack",
            &AttackSummary {
                round,
                findings: findings.len(),
                by_severity: severity_counts(&findings),
            },
        );

        // Zero findings: skip this round's defense and all later rounds.
        if findings.is_empty() {
            break;
        }

        // Defend.
        ctx.phase_start("defend");
        let findings_text = findings
            .iter()
            .map(|f| format!("FINDING {}: {} [{}]\n{}", f.number, f.title, f.severity.as_str(), f.detail))
            .collect::<Vec<_>>()
            .join("\n\n");
        let defend = prompts::defense_prompt(&content, &findings_text, round);
        let defenses = match ctx.gateway.query_one(&defender, &defend, ctx.timeout).await {
            Some(reply) => {
                let parsed = parse_defenses(&reply.content);
                ctx.stages.push(
                    StageRecord::new("defend", &reply.content)
                        .model(&defender)
                        .role("defender")
                        .parsed(&parsed)
                        .time_ms(reply.response_time_ms),
                );
                parsed
            }
            None => {
                // An unanswered round rebuts nothing away — every finding
                // stays on the books as REBUT (conservative default).
                tracing::warn!(round, "defender did not respond — findings default to REBUT");
                Vec::new()
            }
        };

        let mut accepted = 0usize;
        let mut rebutted = 0usize;
        for finding in &findings {
            let defense = defenses
                .iter()
                .find(|d| d.finding_number == finding.number);
            let verdict = defense.map(|d| d.verdict).unwrap_or(DefenseVerdict::Rebut);
            match verdict {
                DefenseVerdict::Accept => {
                    accepted += 1;
                    // An accepted finding's revision becomes the content
                    // the next attack round operates on.
                    if let Some(revised) = defense.and_then(|d: &Defense| d.revised.clone()) {
                        content = revised;
                    }
                }
                DefenseVerdict::Rebut => rebutted += 1,
            }
            audit.push(AuditEntry {
                round,
                finding: finding.number,
                title: finding.title.clone(),
                severity: finding.severity,
                verdict,
            });
        }
        ctx.phase_complete(
            "defend",
            &DefendSummary {
                round,
                accepted,
                rebutted,
            },
        );
    }

    // Synthesize: hardened output plus the audit table.
    ctx.phase_start("synthesize");
    let synthesizer = ctx.special_role_model();
    let audit_rows = audit
        .iter()
        .map(|e| {
            format!(
                "| round {} | finding {} | {} | {} | {} |",
                e.round,
                e.finding,
                e.title,
                e.severity.as_str(),
                e.verdict.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts::redteam_synthesis_prompt(&ctx.question, &content, &audit_rows);
    let Some(reply) = ctx.gateway.query_one(&synthesizer, &prompt, ctx.timeout).await else {
        return ctx.fatal("synthesize", "synthesizer did not respond");
    };
    ctx.stages.push(
        StageRecord::new("synthesize", &reply.content)
            .model(&synthesizer)
            .role("synthesizer")
            .parsed(&audit)
            .time_ms(reply.response_time_ms),
    );

    let accepted = audit
        .iter()
        .filter(|e| e.verdict == DefenseVerdict::Accept)
        .count();
    let overall_risk = audit.iter().map(|e| e.severity).max();
    ctx.phase_complete(
        "synthesize",
        &SynthesisPayload {
            response: &reply.content,
            total_findings: audit.len(),
            accepted,
            overall_risk,
        },
    );
    RunOutcome::Completed
}

fn severity_counts(findings: &[Finding]) -> [usize; 4] {
    let mut counts = [0usize; 4];
    for f in findings {
        match f.severity {
            Severity::Low => counts[0] += 1,
            Severity::Medium => counts[1] += 1,
            Severity::High => counts[2] += 1,
            Severity::Critical => counts[3] += 1,
        }
    }
    counts
}
