//! Blueprint: outline (architect) → expansion (authors) → assembly.

use serde::Serialize;

use crate::modes::{RunContext, RunOutcome};
use crate::parsers::outline::{DocumentOutline, OutlineSection, parse_outline};
use crate::prompts;
use crate::stages::StageRecord;

#[derive(Serialize)]
struct OutlinePayload<'a> {
    title: &'a str,
    sections: usize,
    fallback: bool,
}

#[derive(Serialize)]
struct ExpansionSummary {
    succeeded: usize,
    failed: usize,
}

#[derive(Serialize)]
struct AssemblyPayload<'a> {
    title: &'a str,
    document: &'a str,
    assembler_fallback: bool,
}

struct DraftedSection {
    section: OutlineSection,
    /// None when the author failed.
    text: Option<String>,
}

pub async fn run(ctx: &mut RunContext) -> RunOutcome {
    ctx.emit_start();

    // Outline: one architect call.
    ctx.phase_start("outline");
    let architect = ctx.special_role_model();
    let document_type = ctx
        .config
        .document_type
        .clone()
        .unwrap_or_else(|| "document".to_string());
    let prompt = prompts::outline_prompt(&ctx.question, &document_type);
    let Some(reply) = ctx.gateway.query_one(&architect, &prompt, ctx.timeout).await else {
        return ctx.fatal("outline", "architect did not respond");
    };
    let outline = parse_outline(&reply.content, &ctx.question);
    ctx.stages.push(
        StageRecord::new("outline", &reply.content)
            .model(&architect)
            .role("architect")
            .parsed(&outline)
            .time_ms(reply.response_time_ms),
    );
    // Fewer than 3 parsed sections is unusable — unless zero parsed, where
    // the raw text was already wrapped as a single full-document section.
    if !outline.fallback && outline.sections.len() < 3 {
        return ctx.fatal("outline", "outline produced fewer than 3 sections");
    }
    ctx.phase_complete(
        "outline",
        &OutlinePayload {
            title: &outline.title,
            sections: outline.sections.len(),
            fallback: outline.fallback,
        },
    );

    // Expansion: authors drafted in parallel, round-robin over models. Each
    // author sees the full outline read-only plus one assigned section.
    ctx.phase_start("expansion");
    let outline_text = render_outline(&outline);
    let calls = outline.sections.iter().enumerate().map(|(i, section)| {
        let author = ctx.models[i % ctx.models.len()].clone();
        let prompt = prompts::author_prompt(&ctx.question, &outline_text, section);
        let gateway = ctx.gateway.clone();
        let timeout = ctx.timeout;
        async move {
            let reply = gateway.query_one(&author, &prompt, timeout).await;
            (author, section.clone(), reply)
        }
    });
    let results = futures_util::future::join_all(calls).await;

    let mut drafted: Vec<DraftedSection> = Vec::new();
    for (author, section, reply) in results {
        match reply {
            Some(r) => {
                ctx.stages.push(
                    StageRecord::new("expansion", &r.content)
                        .model(&author)
                        .role("author")
                        .parsed(&serde_json::json!({ "section": section.number }))
                        .time_ms(r.response_time_ms),
                );
                drafted.push(DraftedSection {
                    section,
                    text: Some(r.content),
                });
            }
            None => {
                tracing::warn!(%author, section = section.number, "author did not respond");
                drafted.push(DraftedSection {
                    section,
                    text: None,
                });
            }
        }
    }
    let succeeded = drafted.iter().filter(|d| d.text.is_some()).count();
    if succeeded == 0 {
        return ctx.fatal("expansion", "every author failed");
    }
    ctx.phase_complete(
        "expansion",
        &ExpansionSummary {
            succeeded,
            failed: drafted.len() - succeeded,
        },
    );

    // Assembly: one assembler call; concatenation fallback on failure.
    ctx.phase_start("assembly");
    let todo_lines: Vec<String> = drafted
        .iter()
        .filter(|d| d.text.is_none())
        .map(|d| todo_marker(&d.section))
        .collect();
    let sections_block = drafted
        .iter()
        .map(|d| match &d.text {
            Some(text) => format!("## Section {}: {}\n{}", d.section.number, d.section.name, text),
            None => todo_marker(&d.section),
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let assembler = ctx.special_role_model();
    let prompt = prompts::assembly_prompt(&outline.title, &sections_block);
    let (mut document, assembler_fallback) =
        match ctx.gateway.query_one(&assembler, &prompt, ctx.timeout).await {
            Some(r) => {
                ctx.stages.push(
                    StageRecord::new("assembly", &r.content)
                        .model(&assembler)
                        .role("assembler")
                        .time_ms(r.response_time_ms),
                );
                (r.content, false)
            }
            None => {
                tracing::warn!("assembler did not respond — concatenating sections");
                (concatenate_sections(&drafted), true)
            }
        };

    // Every failed section must be visible in the final document.
    for marker in &todo_lines {
        if !document.contains(marker.as_str()) {
            document.push_str("\n\n");
            document.push_str(marker);
        }
    }

    ctx.phase_complete(
        "assembly",
        &AssemblyPayload {
            title: &outline.title,
            document: &document,
            assembler_fallback,
        },
    );
    RunOutcome::Completed
}

fn todo_marker(section: &OutlineSection) -> String {
    format!(
        "[TODO: Section {} on {} needed]",
        section.number, section.name
    )
}

fn render_outline(outline: &DocumentOutline) -> String {
    let sections = outline
        .sections
        .iter()
        .map(|s| {
            format!(
                "SECTION {}: {}\nDescription: {}\nLength: {:?}",
                s.number, s.name, s.description, s.length
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("DOCUMENT TITLE: {}\n\n{}", outline.title, sections)
}

fn concatenate_sections(drafted: &[DraftedSection]) -> String {
    drafted
        .iter()
        .map(|d| match &d.text {
            Some(text) => format!("## Section {}\n{}", d.section.number, text),
            None => todo_marker(&d.section),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
