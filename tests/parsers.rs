//! Parser robustness: bold decoration, case variation, narrative noise,
//! range validation, and conservative defaults.

use conclave::labels::LabelMap;
use conclave::parsers::claims::{Verdict, parse_claims, parse_reliability_score, parse_verifications};
use conclave::parsers::confidence::{parse_confidence, parse_synthesis};
use conclave::parsers::debate::{Decision, parse_revision};
use conclave::parsers::delphi::{
    ConfidenceLevel, QuestionKind, parse_classification, parse_confidence_level,
    parse_numeric_estimate, parse_qualitative_answer,
};
use conclave::parsers::ideas::{parse_cluster_scores, parse_clusters, parse_ideas};
use conclave::parsers::jury::{JuryVerdict, majority_verdict, parse_juror};
use conclave::parsers::outline::parse_outline;
use conclave::parsers::ranking::parse_ranking;
use conclave::parsers::redteam::{DefenseVerdict, Severity, parse_defenses, parse_findings};
use conclave::parsers::tasks::{clean_dependencies, parse_plan};
use conclave::parsers::tournament::{MatchupSide, parse_matchup_winner};
use conclave::parsers::vote::parse_vote;

fn map3() -> LabelMap {
    LabelMap::new(&["m1".to_string(), "m2".to_string(), "m3".to_string()])
}

// --- vote -------------------------------------------------------------------

#[test]
fn vote_primary_pattern_takes_last_marker() {
    let text = "I considered Response A first.\nVOTE: Response A\nOn reflection:\nVOTE: Response B";
    assert_eq!(parse_vote(text), Some("Response B".to_string()));
}

#[test]
fn vote_tolerates_bold_and_case() {
    assert_eq!(
        parse_vote("**vote:** **Response c**"),
        Some("Response C".to_string())
    );
}

#[test]
fn vote_falls_back_to_last_response_token() {
    let text = "Response A is good but Response B is better.";
    assert_eq!(parse_vote(text), Some("Response B".to_string()));
}

#[test]
fn vote_defaults_to_none() {
    assert_eq!(parse_vote("I abstain from this decision."), None);
}

#[test]
fn vote_ignores_narrative_word_after_response() {
    // "response times" must not parse as a ballot for label "T".
    assert_eq!(parse_vote("The response times were poor."), None);
}

// --- ranking ----------------------------------------------------------------

#[test]
fn ranking_primary_block() {
    let text = "Analysis...\n\nFINAL RANKING:\n1. Response B\n2. Response A\n3. Response C\n";
    let ranking = parse_ranking(text, &map3());
    assert_eq!(ranking, vec!["Response B", "Response A", "Response C"]);
}

#[test]
fn ranking_fallback_extracts_tokens_in_order() {
    let text = "Best is Response C, then Response A, finally Response B.";
    let ranking = parse_ranking(text, &map3());
    assert_eq!(ranking, vec!["Response C", "Response A", "Response B"]);
}

#[test]
fn ranking_drops_unknown_labels_and_duplicates() {
    let text = "FINAL RANKING:\n1. Response A\n2. Response Z\n3. Response A\n4. Response B";
    let ranking = parse_ranking(text, &map3());
    assert_eq!(ranking, vec!["Response A", "Response B"]);
}

#[test]
fn ranking_reparses_its_own_rendering() {
    // Idempotent re-serialization: canonical output re-parses to itself.
    let ranking = vec!["Response B", "Response C"];
    let rendered = format!("FINAL RANKING:\n1. {}\n2. {}", ranking[0], ranking[1]);
    assert_eq!(parse_ranking(&rendered, &map3()), ranking);
}

// --- jury -------------------------------------------------------------------

#[test]
fn juror_plain_scores_and_verdict() {
    let text = "Accuracy: 8\nCompleteness: 7/10\n**Clarity**: 9\nRelevance: 6\nActionability: 5\nVERDICT: APPROVE";
    let parsed = parse_juror(text);
    let scores: Vec<Option<f64>> = parsed.scores.iter().map(|(_, s)| *s).collect();
    assert_eq!(
        scores,
        vec![Some(8.0), Some(7.0), Some(9.0), Some(6.0), Some(5.0)]
    );
    assert_eq!(parsed.average, Some(7.0));
    assert_eq!(parsed.verdict, Some(JuryVerdict::Approve));
}

#[test]
fn juror_table_rows() {
    let text = "| Dimension | Score |\n|---|---|\n| Accuracy | 9 |\n| Clarity | 8 |\nVERDICT: REVISE";
    let parsed = parse_juror(text);
    let accuracy = parsed.scores.iter().find(|(d, _)| d == "Accuracy").unwrap();
    assert_eq!(accuracy.1, Some(9.0));
    assert_eq!(parsed.verdict, Some(JuryVerdict::Revise));
}

#[test]
fn juror_out_of_range_scores_discarded() {
    let text = "Accuracy: 15\nCompleteness: 0\nClarity: 10";
    let parsed = parse_juror(text);
    let by_name = |n: &str| parsed.scores.iter().find(|(d, _)| d == n).unwrap().1;
    assert_eq!(by_name("Accuracy"), None);
    assert_eq!(by_name("Completeness"), None);
    assert_eq!(by_name("Clarity"), Some(10.0));
    assert_eq!(parsed.average, Some(10.0));
}

#[test]
fn juror_verdict_defaults_to_none() {
    assert_eq!(parse_juror("Accuracy: 5").verdict, None);
}

#[test]
fn jury_tie_rules_resolve_to_revise() {
    use JuryVerdict::*;
    // Three-way tie.
    assert_eq!(majority_verdict(&[Approve, Revise, Reject]), Some(Revise));
    // Tie involving REVISE.
    assert_eq!(
        majority_verdict(&[Approve, Approve, Revise, Revise]),
        Some(Revise)
    );
    // APPROVE/REJECT tie.
    assert_eq!(
        majority_verdict(&[Approve, Approve, Reject, Reject]),
        Some(Revise)
    );
    // Clear majority survives.
    assert_eq!(
        majority_verdict(&[Reject, Reject, Approve]),
        Some(Reject)
    );
    assert_eq!(majority_verdict(&[]), None);
}

// --- debate -----------------------------------------------------------------

#[test]
fn revision_revise_extracts_body() {
    let text = "DECISION: REVISE\nREVISED RESPONSE:\nA stronger answer.";
    let parsed = parse_revision(text, "original");
    assert_eq!(parsed.decision, Decision::Revise);
    assert_eq!(parsed.revised, "A stronger answer.");
    assert!(parsed.parse_success);
}

#[test]
fn revision_stand_keeps_original() {
    let parsed = parse_revision("**DECISION:** STAND\nNo changes needed.", "original");
    assert_eq!(parsed.decision, Decision::Stand);
    assert_eq!(parsed.revised, "original");
    assert!(parsed.parse_success);
}

#[test]
fn revision_parse_failure_carries_original() {
    let parsed = parse_revision("I think my answer is fine as-is.", "original");
    assert_eq!(parsed.decision, Decision::Stand);
    assert_eq!(parsed.revised, "original");
    assert!(!parsed.parse_success);
}

// --- delphi -----------------------------------------------------------------

#[test]
fn classification_parses_numeric_with_options() {
    let parsed = parse_classification("TYPE: numeric\nOPTIONS: a, b");
    assert_eq!(parsed.kind, QuestionKind::Numeric);
    assert_eq!(parsed.options, vec!["a", "b"]);
}

#[test]
fn classification_defaults_to_qualitative() {
    assert_eq!(
        parse_classification("hard to say").kind,
        QuestionKind::Qualitative
    );
}

#[test]
fn estimate_primary_and_fallback() {
    assert_eq!(parse_numeric_estimate("ESTIMATE: 42.5"), Some(42.5));
    assert_eq!(parse_numeric_estimate("ESTIMATE: roughly -3"), Some(-3.0));
    // Fallback: first signed/decimal number anywhere.
    assert_eq!(
        parse_numeric_estimate("I would say around 1,200 units."),
        Some(1200.0)
    );
    assert_eq!(parse_numeric_estimate("no idea"), None);
}

#[test]
fn qualitative_answer_and_confidence() {
    assert_eq!(
        parse_qualitative_answer("ANSWER: Rust\nCONFIDENCE: HIGH"),
        Some("Rust".to_string())
    );
    assert_eq!(
        parse_confidence_level("CONFIDENCE: high"),
        ConfidenceLevel::High
    );
    // Default MEDIUM.
    assert_eq!(parse_confidence_level("sure"), ConfidenceLevel::Medium);
    assert_eq!(parse_qualitative_answer("maybe Go?"), None);
}

// --- red team ---------------------------------------------------------------

#[test]
fn findings_with_severity_default() {
    let text = "FINDING 1: SQL injection\nSeverity: CRITICAL\ndetails here\n\nFINDING 2: vague wording\nSeverity: whatever\nmore";
    let findings = parse_findings(text);
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].severity, Severity::Critical);
    // Unknown severity coerces to MEDIUM, never "unknown".
    assert_eq!(findings[1].severity, Severity::Medium);
}

#[test]
fn defenses_default_rebut_and_accept_revision() {
    let text = "RESPONSE TO FINDING 1:\nVerdict: ACCEPT\nREVISED: corrected content here\n\nRESPONSE TO FINDING 2:\nThis one I contest.";
    let defenses = parse_defenses(text);
    assert_eq!(defenses.len(), 2);
    assert_eq!(defenses[0].verdict, DefenseVerdict::Accept);
    assert_eq!(defenses[0].revised.as_deref(), Some("corrected content here"));
    // No verdict line defaults to REBUT.
    assert_eq!(defenses[1].verdict, DefenseVerdict::Rebut);
}

// --- tournament -------------------------------------------------------------

#[test]
fn matchup_winner_primary_and_fallback() {
    assert_eq!(
        parse_matchup_winner("Both strong.\nWINNER: Response B"),
        Some(MatchupSide::B)
    );
    assert_eq!(
        parse_matchup_winner("I lean towards Response A overall."),
        Some(MatchupSide::A)
    );
    assert_eq!(parse_matchup_winner("They are equal."), None);
}

// --- confidence -------------------------------------------------------------

#[test]
fn confidence_value_formats() {
    assert_eq!(parse_confidence("CONFIDENCE: 0.82").value, 0.82);
    assert_eq!(parse_confidence("CONFIDENCE: .82").value, 0.82);
    assert_eq!(parse_confidence("CONFIDENCE: 82%").value, 0.82);
    assert_eq!(parse_confidence("CONFIDENCE: 82").value, 0.82);
    assert_eq!(parse_confidence("CONFIDENCE: 1.0").value, 1.0);
    assert_eq!(parse_confidence("CONFIDENCE: 0").value, 0.0);
}

#[test]
fn confidence_defaults_to_half() {
    let parsed = parse_confidence("I feel pretty good about this.");
    assert_eq!(parsed.value, 0.5);
    assert!(!parsed.parsed_successfully);
}

#[test]
fn synthesis_splits_sections() {
    let text = "SYNTHESIS:\nThe combined answer.\nCONFIDENCE CALIBRATION NOTES:\nOne outlier ignored.";
    let parts = parse_synthesis(text);
    assert_eq!(parts.synthesis, "The combined answer.");
    assert_eq!(
        parts.calibration_notes.as_deref(),
        Some("One outlier ignored.")
    );
}

#[test]
fn synthesis_fallback_is_whole_body() {
    let parts = parse_synthesis("Just an answer, no markers.");
    assert_eq!(parts.synthesis, "Just an answer, no markers.");
    assert_eq!(parts.calibration_notes, None);
}

// --- outline ----------------------------------------------------------------

#[test]
fn outline_sections_parse() {
    let text = "DOCUMENT TITLE: Migration Guide\n\
        SECTION 1: Overview\nDescription: why migrate\nKey Topics:\n- goals\n- risks\nLength: Short\nSource Coverage: intro\n\
        SECTION 2: Steps\nDescription: how\nLength: Long\n\
        SECTION 3: Rollback\nDescription: undo\nLength: Medium\n";
    let outline = parse_outline(text, "q");
    assert_eq!(outline.title, "Migration Guide");
    assert_eq!(outline.sections.len(), 3);
    assert_eq!(outline.sections[0].key_topics, vec!["goals", "risks"]);
    assert!(!outline.fallback);
}

#[test]
fn outline_zero_sections_wraps_raw_text() {
    let outline = parse_outline("Here is everything you need to know...", "q");
    assert!(outline.fallback);
    assert_eq!(outline.sections.len(), 1);
    assert_eq!(outline.sections[0].name, "Full Document");
}

#[test]
fn outline_truncates_past_twenty_sections() {
    let mut text = String::from("DOCUMENT TITLE: Big\n");
    for i in 1..=25 {
        text.push_str(&format!("SECTION {i}: Part {i}\nDescription: d\n"));
    }
    let outline = parse_outline(&text, "q");
    assert_eq!(outline.sections.len(), 20);
}

// --- decompose plan ---------------------------------------------------------

#[test]
fn plan_parses_tasks_and_cleans_deps() {
    let text = "TASK task_1:\nTitle: Research\nDescription: find facts\nDependencies: none\nComplexity: LOW\nExpertise: search\n\n\
        TASK task_2:\nTitle: Write\nDescription: draft\nDependencies: task_1, task_2, task_9\nComplexity: HIGH\nExpertise: writing\n";
    let mut tasks = parse_plan(text);
    assert_eq!(tasks.len(), 2);
    let deps = clean_dependencies(&mut tasks);
    // Self-refs and unknown ids are dropped.
    assert_eq!(deps["task_2"], vec!["task_1"]);
    assert!(deps["task_1"].is_empty());
}

// --- brainstorm -------------------------------------------------------------

#[test]
fn ideas_get_deterministic_ids() {
    let text = "IDEA 1: Solar kiosks\nPut panels on kiosks.\n\nIDEA 2: Wind walls\nVertical turbines.";
    let ideas = parse_ideas(text, 1);
    assert_eq!(ideas.len(), 2);
    assert_eq!(ideas[0].id, "model_1_idea_1");
    assert_eq!(ideas[0].source_label, "Model B");
    assert_eq!(ideas[1].title, "Wind walls");
}

#[test]
fn clusters_drop_unknown_ids_and_empties() {
    let known = vec!["model_0_idea_1".to_string(), "model_1_idea_1".to_string()];
    let text = "CLUSTER 1:\nName: Energy\nTheme: power generation\nPromise: HIGH\nIdeas: model_0_idea_1, model_9_idea_9\n\n\
        CLUSTER 2:\nName: Ghost\nTheme: none\nPromise: LOW\nIdeas: model_9_idea_1";
    let clusters = parse_clusters(text, &known);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].idea_ids, vec!["model_0_idea_1"]);
}

#[test]
fn cluster_scores_clamped_to_range() {
    let scores = parse_cluster_scores("CLUSTER 1: Novelty=9 Feasibility=3 Impact=0\nCLUSTER 2: Novelty=4 Feasibility=4 Impact=5");
    assert_eq!(scores[&1].novelty, 5.0);
    assert_eq!(scores[&1].impact, 1.0);
    assert_eq!(scores[&2].total(), 13.0);
}

// --- fact-check -------------------------------------------------------------

#[test]
fn claims_deduplicate_by_text() {
    let text = "CLAIM 1: The sun is a star\nContext: astronomy\nType: TECHNICAL\n\n\
        CLAIM 2: The sun is a star\nContext: repeated\nType: TECHNICAL\n\n\
        CLAIM 3: Water boils at 100C\nContext: chemistry\nType: STATISTIC";
    let claims = parse_claims(text);
    assert_eq!(claims.len(), 2);
}

#[test]
fn verifications_parse_with_na_correction() {
    let text = "VERIFICATION claim_1:\nVERDICT: VERIFIED\nEvidence: well documented\nCorrection: N/A\nConfidence: HIGH\n\n\
        VERIFICATION claim_2:\nVERDICT: DISPUTED\nEvidence: outdated\nCorrection: Water boils at 100C at sea level\nConfidence: MEDIUM";
    let parsed = parse_verifications(text);
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].verdict, Verdict::Verified);
    assert_eq!(parsed[0].correction, None);
    assert_eq!(
        parsed[1].correction.as_deref(),
        Some("Water boils at 100C at sea level")
    );
}

#[test]
fn reliability_score_clamped() {
    assert_eq!(parse_reliability_score("Reliability Score: 85"), Some(85.0));
    assert_eq!(parse_reliability_score("Reliability Score: 300"), Some(100.0));
    assert_eq!(parse_reliability_score("no score"), None);
}
