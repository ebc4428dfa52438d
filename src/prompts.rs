//! Prompt templates: pure functions from typed inputs to model prompts.
//!
//! Templates are deliberately decoupled from runner control flow — they
//! take values, return strings, and know nothing about phases or events.
//! Format instructions here must stay in lockstep with the parsers that
//! read the replies.

use crate::parsers::claims::Claim;
use crate::parsers::ideas::{Cluster, Idea};
use crate::parsers::outline::OutlineSection;
use crate::parsers::tasks::PlannedTask;
use crate::request::SpecialistRole;

fn anonymized_block(responses: &[(String, String)]) -> String {
    responses
        .iter()
        .map(|(label, text)| format!("### {label}\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

// --- Council ---------------------------------------------------------------

pub fn ranking_prompt(question: &str, responses: &[(String, String)]) -> String {
    format!(
        "Several responses to the question below are shown under anonymous labels.\n\
         Question: {question}\n\n\
         {block}\n\n\
         Evaluate every response for accuracy, depth, and usefulness. Then output\n\
         a line reading exactly `FINAL RANKING:` followed by a numbered list of\n\
         the labels from best to worst, e.g.\n\
         FINAL RANKING:\n1. Response B\n2. Response A",
        block = anonymized_block(responses),
    )
}

pub fn council_synthesis_prompt(
    question: &str,
    stage1: &[(String, String)],
    rankings: &[(String, f64)],
) -> String {
    let ranking_rows = rankings
        .iter()
        .map(|(model, rank)| format!("- {model}: average position {rank:.2}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are the chairman of a model council. The council answered the\n\
         question below, then ranked each other's anonymized answers.\n\n\
         Question: {question}\n\n\
         Council answers:\n{answers}\n\n\
         Aggregate ranking (lower is better):\n{ranking_rows}\n\n\
         Write the definitive answer, drawing on the strongest council\n\
         material and correcting weaknesses the ranking exposed.",
        answers = anonymized_block(stage1),
    )
}

// --- Vote ------------------------------------------------------------------

pub fn vote_prompt(question: &str, responses: &[(String, String)]) -> String {
    format!(
        "Question: {question}\n\n\
         Candidate responses:\n{block}\n\n\
         Pick the single best response. Explain briefly, then end your reply\n\
         with a line reading exactly `VOTE: Response X`.",
        block = anonymized_block(responses),
    )
}

pub fn tiebreak_prompt(question: &str, tied: &[(String, String)]) -> String {
    format!(
        "A vote between the responses below ended in a tie. You are the\n\
         tiebreaker.\n\n\
         Question: {question}\n\n\
         Tied responses:\n{block}\n\n\
         End your reply with a line reading exactly `VOTE: Response X`.",
        block = anonymized_block(tied),
    )
}

// --- Jury ------------------------------------------------------------------

pub fn juror_prompt(question: &str, content: &str) -> String {
    format!(
        "You are one juror evaluating the answer below.\n\n\
         Question: {question}\n\n\
         Answer under review:\n{content}\n\n\
         Score each dimension from 1 to 10, one per line:\n\
         Accuracy: N\nCompleteness: N\nClarity: N\nRelevance: N\nActionability: N\n\n\
         Justify each score in a sentence, then end with a line reading\n\
         exactly `VERDICT: APPROVE`, `VERDICT: REVISE`, or `VERDICT: REJECT`."
    )
}

pub fn foreman_prompt(
    question: &str,
    content: &str,
    juror_texts: &[(String, String)],
    tally_summary: &str,
    majority: &str,
) -> String {
    let deliberations = juror_texts
        .iter()
        .map(|(model, text)| format!("### Juror {model}\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are the jury foreman. Synthesize the deliberation below into a\n\
         final verdict statement.\n\n\
         Question: {question}\n\n\
         Answer under review:\n{content}\n\n\
         Juror deliberations:\n{deliberations}\n\n\
         Computed tally: {tally_summary}\n\
         Majority verdict: {majority}\n\n\
         Summarize the jury's reasoning, state what should change (if\n\
         anything), and end with a line reading exactly `VERDICT: {majority}`\n\
         unless the deliberations clearly compel a different verdict."
    )
}

// --- Debate ----------------------------------------------------------------

pub fn debate_revision_prompt(
    question: &str,
    own_response: &str,
    peers: &[(String, String)],
) -> String {
    format!(
        "Question: {question}\n\n\
         Your original response:\n{own_response}\n\n\
         Your opponents' responses (anonymized):\n{block}\n\n\
         Decide whether to revise. Start your reply with a line reading\n\
         exactly `DECISION: REVISE`, `DECISION: STAND`, or `DECISION: MERGE`.\n\
         For REVISE or MERGE, follow with the complete revised response.\n\
         For STAND, no body is needed — your original stands.",
        block = anonymized_block(peers),
    )
}

// --- Delphi ----------------------------------------------------------------

pub fn delphi_classify_prompt(question: &str) -> String {
    format!(
        "Classify the question below for a Delphi panel.\n\n\
         Question: {question}\n\n\
         Reply with:\n\
         TYPE: numeric or qualitative\n\
         OPTIONS: a comma-separated list of answer choices (qualitative\n\
         questions with natural options only; otherwise omit the line)."
    )
}

pub fn delphi_round1_prompt(
    question: &str,
    kind: crate::parsers::delphi::QuestionKind,
    options: &[String],
) -> String {
    let format_lines = match kind {
        crate::parsers::delphi::QuestionKind::Numeric => {
            "ESTIMATE: your single numeric estimate\nCONFIDENCE: LOW, MEDIUM, or HIGH".to_string()
        }
        crate::parsers::delphi::QuestionKind::Qualitative => {
            let choices = if options.is_empty() {
                String::new()
            } else {
                format!(" (choose from: {})", options.join(", "))
            };
            format!("ANSWER: your answer{choices}\nCONFIDENCE: LOW, MEDIUM, or HIGH")
        }
    };
    format!(
        "You are one panelist in an anonymous Delphi study.\n\n\
         Question: {question}\n\n\
         Give your reasoning, then end with:\n{format_lines}"
    )
}

pub fn delphi_feedback_numeric_prompt(
    question: &str,
    own_previous: f64,
    stats: &crate::aggregate::NumericSummary,
) -> String {
    format!(
        "Delphi round update. Question: {question}\n\n\
         Your previous estimate: {own_previous}\n\
         Panel statistics from the last round (individual answers stay\n\
         anonymous): mean {mean:.2}, median {median:.2}, stddev {stddev:.2},\n\
         range {min:.2}–{max:.2}.\n\n\
         Reconsider in light of the panel. You may keep or change your\n\
         estimate. End with:\nESTIMATE: your estimate\nCONFIDENCE: LOW, MEDIUM, or HIGH",
        mean = stats.mean,
        median = stats.median,
        stddev = stats.stddev,
        min = stats.min,
        max = stats.max,
    )
}

pub fn delphi_feedback_qualitative_prompt(
    question: &str,
    own_previous: &str,
    dist: &crate::aggregate::Distribution,
) -> String {
    let rows = dist
        .counts
        .iter()
        .map(|(answer, count)| format!("- {answer}: {count}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Delphi round update. Question: {question}\n\n\
         Your previous answer: {own_previous}\n\
         Panel distribution from the last round (individual answers stay\n\
         anonymous):\n{rows}\n\
         Agreement: {agreement:.0}% on \"{mode}\".\n\n\
         Reconsider in light of the panel. End with:\n\
         ANSWER: your answer\nCONFIDENCE: LOW, MEDIUM, or HIGH",
        agreement = dist.agreement_pct,
        mode = dist.mode,
    )
}

pub fn delphi_synthesis_prompt(question: &str, rounds_summary: &str, final_value: &str) -> String {
    format!(
        "You facilitated a Delphi study on the question below. Write the\n\
         final report: the consensus value, how the panel converged, and any\n\
         remaining disagreement.\n\n\
         Question: {question}\n\n\
         Round-by-round statistics:\n{rounds_summary}\n\n\
         Final panel value: {final_value}"
    )
}

// --- Red Team --------------------------------------------------------------

pub fn redteam_generate_prompt(question: &str) -> String {
    format!(
        "Produce the strongest answer you can to the request below. It will\n\
         be adversarially stress-tested, so favor precision over flourish.\n\n\
         {question}"
    )
}

pub fn attack_prompt(content: &str, round: usize) -> String {
    format!(
        "You are a red-team attacker (round {round}). Find concrete flaws in\n\
         the content below: factual errors, unstated assumptions, security or\n\
         safety gaps, logical holes.\n\n\
         Content:\n{content}\n\n\
         Report each flaw as a numbered block:\n\
         FINDING 1: short title\n\
         Severity: CRITICAL, HIGH, MEDIUM, or LOW\n\
         followed by the details. If the content is sound, report no findings."
    )
}

pub fn defense_prompt(content: &str, findings_text: &str, round: usize) -> String {
    format!(
        "You are defending the content below against red-team findings\n\
         (round {round}).\n\n\
         Content:\n{content}\n\n\
         Findings:\n{findings_text}\n\n\
         Answer every finding as a numbered block:\n\
         RESPONSE TO FINDING 1:\n\
         Verdict: ACCEPT or REBUT\n\
         For ACCEPT, include `REVISED:` followed by the corrected content for\n\
         that finding. For REBUT, explain why the finding does not hold."
    )
}

pub fn redteam_synthesis_prompt(question: &str, content: &str, audit_rows: &str) -> String {
    format!(
        "Red-team review of the request below is complete. Produce the final\n\
         hardened output, incorporating every accepted fix.\n\n\
         Request: {question}\n\n\
         Current content:\n{content}\n\n\
         Audit table of findings:\n{audit_rows}\n\n\
         Output the hardened content, then a short audit summary."
    )
}

// --- Chain -----------------------------------------------------------------

pub fn chain_draft_prompt(question: &str, mandate: &str) -> String {
    format!(
        "You are the first link of a sequential pipeline. Your mandate:\n\
         {mandate}\n\n\
         Request: {question}\n\n\
         Produce the draft the next link will build on."
    )
}

pub fn chain_step_prompt(
    question: &str,
    mandate: &str,
    previous_output: &str,
    deferred: &[String],
) -> String {
    let deferred_note = if deferred.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nEarlier links failed before completing these mandates — fold\n\
             them into your pass where possible:\n{}",
            deferred
                .iter()
                .map(|m| format!("- {m}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };
    format!(
        "You are one link of a sequential pipeline. Your mandate:\n{mandate}\n\n\
         Original request: {question}\n\n\
         Output of the previous link:\n{previous_output}{deferred_note}\n\n\
         Apply your mandate and output the full improved result."
    )
}

// --- Specialist Panel ------------------------------------------------------

pub fn specialist_prompt(question: &str, role: &SpecialistRole) -> String {
    format!(
        "You are the panel's {name}. Your lens: {focus}\n\n\
         Assess the request below strictly from that perspective.\n\n\
         Request: {question}\n\n\
         Structure your report as:\n\
         - a markdown table of criteria you judged, `| criterion | score /10 |`\n\
         - numbered blocks `RECOMMENDATION 1:` … (your top three)\n\
         - a `KEY FINDINGS:` section with dash items.",
        name = role.name,
        focus = role.focus,
    )
}

pub fn panel_synthesis_prompt(question: &str, reports: &[(String, String, String)]) -> String {
    let body = reports
        .iter()
        .map(|(model, role, text)| format!("### {role} ({model})\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Specialist reports on the request below are in. Synthesize them into\n\
         one recommendation that weighs each specialist's lens.\n\n\
         Request: {question}\n\n\
         {body}"
    )
}

// --- Blueprint -------------------------------------------------------------

pub fn outline_prompt(question: &str, document_type: &str) -> String {
    format!(
        "You are the architect of a {document_type}. Design its outline.\n\n\
         Request: {question}\n\n\
         Output:\n\
         DOCUMENT TITLE: the title\n\
         then one block per section:\n\
         SECTION 1: section name\n\
         Description: what it covers\n\
         Key Topics:\n- topic\n- topic\n\
         Length: Short, Medium, or Long\n\
         Source Coverage: which parts of the request it draws on"
    )
}

pub fn author_prompt(question: &str, outline_text: &str, section: &OutlineSection) -> String {
    format!(
        "You are writing one section of a larger document. The full outline\n\
         is context only — write nothing but your assigned section.\n\n\
         Request: {question}\n\n\
         Full outline:\n{outline_text}\n\n\
         Your section: {number}. {name}\n\
         Description: {description}\n\
         Target length: {length:?}\n\n\
         Write the section in full.",
        number = section.number,
        name = section.name,
        description = section.description,
        length = section.length,
    )
}

pub fn assembly_prompt(title: &str, sections: &str) -> String {
    format!(
        "Assemble the drafted sections below into the final document titled\n\
         \"{title}\". Smooth transitions, deduplicate overlap, keep every\n\
         section's substance. Note any missing sections as TODO markers.\n\n\
         {sections}"
    )
}

// --- Peer Review -----------------------------------------------------------

pub fn reviewer_prompt(content: &str, rubric: &[(String, f64)]) -> String {
    let rows = rubric
        .iter()
        .map(|(name, weight)| format!("- {name} (weight {weight})"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Review the work below against the rubric.\n\n\
         Work under review:\n{content}\n\n\
         Rubric:\n{rows}\n\n\
         Output a markdown scoring table\n\
         `| criterion | score /10 | weight | justification |`,\n\
         then numbered blocks `FINDING 1:` with\n\
         `Severity: CRITICAL, MAJOR, MINOR, or SUGGESTION` and details."
    )
}

pub fn consolidation_prompt(content: &str, reviews: &[(String, String)], consensus: &str) -> String {
    let body = reviews
        .iter()
        .map(|(model, text)| format!("### Reviewer {model}\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Consolidate the peer reviews below into one report: overall\n\
         assessment, the findings that matter (deduplicated), and a\n\
         prioritized change list.\n\n\
         Work under review:\n{content}\n\n\
         {body}\n\n\
         Per-criterion consensus:\n{consensus}"
    )
}

// --- Tournament ------------------------------------------------------------

pub fn matchup_prompt(question: &str, a: &str, b: &str) -> String {
    format!(
        "Judge the two anonymous responses below.\n\n\
         Question: {question}\n\n\
         ### Response A\n{a}\n\n### Response B\n{b}\n\n\
         Compare them on accuracy, depth, and usefulness, then end with a\n\
         line reading exactly `WINNER: Response A` or `WINNER: Response B`."
    )
}

pub fn matchup_strict_prompt(question: &str, a: &str, b: &str) -> String {
    format!(
        "Question: {question}\n\n\
         ### Response A\n{a}\n\n### Response B\n{b}\n\n\
         Reply with exactly one line and nothing else:\n\
         `WINNER: Response A` or `WINNER: Response B`."
    )
}

// --- Confidence-Weighted ---------------------------------------------------

pub fn confidence_answer_prompt(question: &str) -> String {
    format!(
        "Answer the question below, then assess yourself honestly.\n\n\
         Question: {question}\n\n\
         End your reply with a line reading exactly\n\
         `CONFIDENCE: 0.NN` (0 = guessing, 1 = certain)."
    )
}

pub fn confidence_synthesis_prompt(question: &str, weighted_block: &str) -> String {
    format!(
        "Synthesize the answers below into one. Each is tagged with its\n\
         softmax weight from the model's self-assessed confidence; outlier\n\
         confidences (≥0.95 or ≤0.1) are flagged — weigh those skeptically.\n\n\
         Question: {question}\n\n\
         {weighted_block}\n\n\
         Structure your reply as:\n\
         SYNTHESIS:\nthe combined answer\n\
         CONFIDENCE CALIBRATION NOTES:\nhow the confidence spread shaped it."
    )
}

// --- Decompose -------------------------------------------------------------

pub fn plan_prompt(question: &str, max_tasks: usize) -> String {
    format!(
        "Decompose the request below into at most {max_tasks} sub-tasks.\n\n\
         Request: {question}\n\n\
         Output one block per task:\n\
         TASK task_1: \n\
         Title: short title\n\
         Description: what to produce\n\
         Dependencies: task ids this depends on, comma-separated, or none\n\
         Complexity: LOW, MEDIUM, or HIGH\n\
         Expertise: the skill it needs"
    )
}

pub fn plan_retry_prompt(question: &str, max_tasks: usize) -> String {
    format!(
        "{base}\n\n\
         IMPORTANT: the dependency graph MUST be a DAG. No task may depend,\n\
         directly or transitively, on itself. Re-check every Dependencies\n\
         line before answering.",
        base = plan_prompt(question, max_tasks),
    )
}

pub fn worker_prompt(question: &str, task: &PlannedTask, predecessors: &str) -> String {
    format!(
        "You are executing one sub-task of a larger decomposition.\n\n\
         Overall request: {question}\n\n\
         Your task ({id}): {title}\n{description}\n\n\
         Predecessor outputs:\n{predecessors}\n\n\
         Produce your task's output, complete and self-contained.",
        id = task.id,
        title = task.title,
        description = task.description,
    )
}

pub fn assemble_prompt(question: &str, plan_summary: &str, outputs: &str) -> String {
    format!(
        "Assemble the sub-task outputs below into the final deliverable.\n\n\
         Request: {question}\n\n\
         Plan:\n{plan_summary}\n\n\
         Outputs:\n{outputs}\n\n\
         Integrate everything; note failed sub-tasks explicitly rather than\n\
         papering over the gaps."
    )
}

// --- Brainstorm ------------------------------------------------------------

pub fn ideate_prompt(question: &str) -> String {
    format!(
        "Brainstorm distinct ideas for the prompt below — aim for range over\n\
         polish.\n\n\
         Prompt: {question}\n\n\
         Output each idea as:\n\
         IDEA 1: short title\n\
         one paragraph developing it."
    )
}

pub fn cluster_prompt(question: &str, ideas: &[Idea], max_clusters: usize) -> String {
    let listing = ideas
        .iter()
        .map(|i| format!("[{id}] ({src}) {title}: {body}", id = i.id, src = i.source_label, title = i.title, body = i.body))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are curating a brainstorm on: {question}\n\n\
         Ideas (each tagged with its id):\n{listing}\n\n\
         Group them into at most {max_clusters} thematic clusters:\n\
         CLUSTER 1:\n\
         Name: cluster name\n\
         Theme: one sentence\n\
         Promise: HIGH, MEDIUM, or LOW\n\
         Ideas: comma-separated idea ids"
    )
}

pub fn score_prompt(question: &str, clusters: &[Cluster]) -> String {
    let listing = clusters
        .iter()
        .map(|c| format!("CLUSTER {}: {} — {}", c.number, c.name, c.theme))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Score each idea cluster below for the prompt: {question}\n\n\
         {listing}\n\n\
         For every cluster output one line:\n\
         CLUSTER n: Novelty=x Feasibility=y Impact=z\n\
         with x, y, z integers from 1 to 5."
    )
}

pub fn refine_prompt(question: &str, winners: &str) -> String {
    format!(
        "The brainstorm on \"{question}\" selected the cluster(s) below.\n\
         Refine them into one concrete, actionable proposal.\n\n\
         {winners}"
    )
}

// --- Fact-Check ------------------------------------------------------------

pub fn factcheck_generate_prompt(question: &str) -> String {
    format!(
        "Write a thorough, factual answer to the question below. It will be\n\
         independently fact-checked, so make concrete, checkable statements.\n\n\
         {question}"
    )
}

pub fn extract_prompt(content: &str) -> String {
    format!(
        "Extract every discrete verifiable claim from the content below.\n\n\
         Content:\n{content}\n\n\
         Output each claim as:\n\
         CLAIM 1: the claim, stated precisely\n\
         Context: the surrounding context\n\
         Type: STATISTIC, DATE, ATTRIBUTION, TECHNICAL, COMPARISON, or CAUSAL"
    )
}

pub fn verify_prompt(content: &str, claims: &[Claim]) -> String {
    let listing = claims
        .iter()
        .map(|c| format!("claim_{}: {}", c.number, c.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Independently verify each claim below, extracted from this content:\n\
         {content}\n\n\
         Claims:\n{listing}\n\n\
         For EVERY claim output a block:\n\
         VERIFICATION claim_1:\n\
         VERDICT: VERIFIED, DISPUTED, or UNVERIFIABLE\n\
         Evidence: why\n\
         Correction: the corrected statement, or N/A\n\
         Confidence: HIGH, MEDIUM, or LOW"
    )
}

pub fn report_prompt(question: &str, consensus_rows: &str) -> String {
    format!(
        "Write the fact-check report for: {question}\n\n\
         Per-claim consensus from independent checkers:\n{consensus_rows}\n\n\
         Summarize what held up, what did not, and corrections. End with a\n\
         line reading exactly `Reliability Score: N` (0–100)."
    )
}

// --- Title -----------------------------------------------------------------

pub fn title_prompt(question: &str) -> String {
    format!(
        "Summarize this conversation topic in 3-5 words. No quotes, no\n\
         punctuation beyond spaces.\n\nTopic: {question}"
    )
}
