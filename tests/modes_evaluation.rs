//! Evaluation- and generation-family runs: Jury, Specialist Panel,
//! Peer Review, Brainstorm, Fact-Check.

mod common;

use std::sync::Arc;

use common::{FakeGateway, config_with_models, find, kinds, request, run};
use conclave::registry::Mode;

fn juror_reply(score: u32, verdict: &str) -> String {
    format!(
        "Accuracy: {score}\nCompleteness: {score}\nClarity: {score}\nRelevance: {score}\nActionability: {score}\nVERDICT: {verdict}"
    )
}

#[tokio::test]
async fn jury_majority_verdict_flows_to_foreman() {
    let gateway = Arc::new(FakeGateway::new());
    // Present (j1), then three jurors, then foreman.
    gateway.script("j1", Some("The presented answer"));
    gateway.script("j1", Some(&juror_reply(8, "APPROVE")));
    gateway.script("j2", Some(&juror_reply(4, "REJECT")));
    gateway.script("j3", Some(&juror_reply(5, "REJECT")));
    gateway.script("foreman", Some("The jury leans negative.\nVERDICT: REJECT"));

    let mut config = config_with_models(&["j1", "j2", "j3"]);
    config.chairman_model = Some("foreman".to_string());
    let (events, _) = run(gateway, request(Mode::Jury, "judge this", config)).await;

    let deliberation = find(&events, "deliberation_complete").unwrap();
    let data = deliberation.data.as_ref().unwrap();
    assert_eq!(data["majority"], "REJECT");
    assert_eq!(data["jurors"], 3);
    let dims = data["dimensions"].as_array().unwrap();
    assert_eq!(dims.len(), 5);
    let accuracy = &dims[0];
    assert_eq!(accuracy["min"], 4.0);
    assert_eq!(accuracy["max"], 8.0);

    let verdict = find(&events, "verdict_complete").unwrap();
    assert_eq!(verdict.data.as_ref().unwrap()["verdict"], "REJECT");
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn jury_foreman_parse_failure_falls_back_to_majority() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("j1", Some("The presented answer"));
    gateway.script("j1", Some(&juror_reply(8, "APPROVE")));
    gateway.script("j2", Some(&juror_reply(7, "APPROVE")));
    gateway.script("j3", Some(&juror_reply(5, "REVISE")));
    // Foreman never states a verdict line.
    gateway.script("foreman", Some("An eloquent summary with no marker."));

    let mut config = config_with_models(&["j1", "j2", "j3"]);
    config.chairman_model = Some("foreman".to_string());
    let (events, _) = run(gateway, request(Mode::Jury, "judge this", config)).await;

    let verdict = find(&events, "verdict_complete").unwrap();
    assert_eq!(verdict.data.as_ref().unwrap()["verdict"], "APPROVE");
}

#[tokio::test]
async fn specialist_panel_roles_and_synthesis() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script(
        "s1",
        Some("| feasibility | 8 |\nRECOMMENDATION 1: do it\nKEY FINDINGS:\n- promising"),
    );
    gateway.script(
        "s2",
        Some("| risk | 4 |\nRECOMMENDATION 1: hedge first\nKEY FINDINGS:\n- risky"),
    );
    gateway.script("synth", Some("Balanced recommendation"));

    let mut config = config_with_models(&["s1", "s2"]);
    config.chairman_model = Some("synth".to_string());
    let shared = gateway.clone();
    let (events, _) = run(gateway, request(Mode::SpecialistPanel, "should we?", config)).await;

    let reports = kinds(&events)
        .iter()
        .filter(|k| **k == "specialist_report")
        .count();
    assert_eq!(reports, 2);

    // Each specialist prompt is role-templated with a distinct lens.
    let s1_prompt = shared
        .calls()
        .into_iter()
        .find(|(model, _)| model == "s1")
        .unwrap()
        .1;
    assert!(s1_prompt.contains("Strategist"));

    let synthesis = find(&events, "synthesis_complete").unwrap();
    assert_eq!(
        synthesis.data.as_ref().unwrap()["response"],
        "Balanced recommendation"
    );
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn peer_review_consensus_and_consolidation() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script(
        "r1",
        Some("| Accuracy | 8 | 3 | solid sourcing |\nFINDING 1: missing citation\nSeverity: MAJOR\npage 2"),
    );
    gateway.script("r2", Some("| Accuracy | 9 | 3 | verified claims |"));
    gateway.script("cons", Some("Consolidated review"));

    let mut config = config_with_models(&["r1", "r2"]);
    config.chairman_model = Some("cons".to_string());
    config.content_to_check = Some("The draft under review".to_string());
    let (events, _) = run(gateway, request(Mode::PeerReview, "review the draft", config)).await;

    let review = find(&events, "review_complete").unwrap();
    let consensus = review.data.as_ref().unwrap()["consensus"].as_array().unwrap();
    let accuracy = consensus
        .iter()
        .find(|c| c["criterion"] == "accuracy")
        .unwrap();
    assert_eq!(accuracy["average"], 8.5);
    // Population stddev 0.5 sits on the Medium boundary.
    assert_eq!(accuracy["agreement"], "Medium");

    let consolidation = find(&events, "consolidation_complete").unwrap();
    assert_eq!(
        consolidation.data.as_ref().unwrap()["response"],
        "Consolidated review"
    );
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn peer_review_fatal_below_two_reviewers() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("r1", Some("| Accuracy | 8 |"));

    let mut config = config_with_models(&["r1", "r2"]);
    config.chairman_model = Some("cons".to_string());
    let (events, _) = run(gateway, request(Mode::PeerReview, "review", config)).await;
    assert_eq!(events.last().unwrap().kind, "error");
}

#[tokio::test]
async fn brainstorm_single_cluster_short_circuits_scoring() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script(
        "b1",
        Some("IDEA 1: One\nFirst idea body.\n\nIDEA 2: Two\nSecond idea body."),
    );
    gateway.script("b2", Some("IDEA 1: Three\nThird idea body."));
    gateway.script(
        "cur",
        Some("CLUSTER 1:\nName: Everything\nTheme: one theme\nPromise: HIGH\nIdeas: model_0_idea_1, model_0_idea_2, model_1_idea_1"),
    );
    gateway.script("cur", Some("Refined proposal"));

    let mut config = config_with_models(&["b1", "b2"]);
    config.chairman_model = Some("cur".to_string());
    let (events, _) = run(gateway, request(Mode::Brainstorm, "new product ideas", config)).await;

    // Single cluster: the score phase never runs.
    assert!(find(&events, "score_start").is_none());

    let refine = find(&events, "refine_complete").unwrap();
    let data = refine.data.as_ref().unwrap();
    assert_eq!(data["winners"].as_array().unwrap().len(), 1);
    assert_eq!(data["winners"][0], "Everything");
    assert_eq!(data["response"], "Refined proposal");
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn brainstorm_unparseable_clusters_fall_back_to_source_groups() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("b1", Some("IDEA 1: One\nbody"));
    gateway.script("b2", Some("IDEA 1: Two\nbody"));
    // Curator rambles with no CLUSTER blocks.
    gateway.script("cur", Some("these all seem fine to me"));
    gateway.script("cur", Some("score ignored"));
    gateway.script("b1", Some("CLUSTER 1: Novelty=4 Feasibility=3 Impact=5\nCLUSTER 2: Novelty=2 Feasibility=5 Impact=2"));
    gateway.script("b2", Some("CLUSTER 1: Novelty=3 Feasibility=3 Impact=4\nCLUSTER 2: Novelty=2 Feasibility=4 Impact=2"));

    let mut config = config_with_models(&["b1", "b2"]);
    config.chairman_model = Some("cur".to_string());
    let (events, _) = run(gateway, request(Mode::Brainstorm, "ideas", config)).await;

    let cluster = find(&events, "cluster_complete").unwrap();
    let data = cluster.data.as_ref().unwrap();
    assert_eq!(data["fallback"], true);
    assert_eq!(data["clusters"].as_array().unwrap().len(), 2);
    assert_eq!(events.last().unwrap().kind, "complete");
}

fn checker_full() -> &'static str {
    "VERIFICATION claim_1:\nVERDICT: VERIFIED\nEvidence: documented\nCorrection: N/A\nConfidence: HIGH\n\n\
     VERIFICATION claim_2:\nVERDICT: DISPUTED\nEvidence: outdated figure\nCorrection: It is 38 percent\nConfidence: MEDIUM"
}

#[tokio::test]
async fn fact_check_consensus_with_skipped_claim() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script(
        "rep",
        Some("CLAIM 1: The sky is blue\nContext: optics\nType: TECHNICAL\n\nCLAIM 2: Adoption is 50 percent\nContext: stats\nType: STATISTIC"),
    );
    gateway.script("f1", Some(checker_full()));
    // f2 addresses only claim 1 — claim 2 synthesizes as UNVERIFIABLE.
    gateway.script(
        "f2",
        Some("VERIFICATION claim_1:\nVERDICT: VERIFIED\nEvidence: basic physics\nCorrection: N/A\nConfidence: HIGH"),
    );
    gateway.script("rep", Some("Mostly accurate.\nReliability Score: 62"));

    let mut config = config_with_models(&["f1", "f2"]);
    config.chairman_model = Some("rep".to_string());
    config.content_to_check = Some("The sky is blue. Adoption is 50 percent.".to_string());
    let (events, _) = run(gateway, request(Mode::FactCheck, "check this", config)).await;

    // Supplied content: no generate phase, no bias warning.
    assert!(find(&events, "generate_start").is_none());
    let start = find(&events, "fact_check_start").unwrap();
    assert!(start.data.as_ref().unwrap().get("warning").is_none());

    let verify = find(&events, "verify_complete").unwrap();
    let consensus = verify.data.as_ref().unwrap()["consensus"].as_array().unwrap();
    assert_eq!(consensus.len(), 2);
    assert_eq!(consensus[0]["verdict"], "VERIFIED");
    assert_eq!(consensus[0]["confidence"], "HIGH");
    // DISPUTED vs synthesized UNVERIFIABLE: the tie involving UNVERIFIABLE
    // goes to the other verdict.
    assert_eq!(consensus[1]["verdict"], "DISPUTED");
    assert_eq!(consensus[1]["correction"], "It is 38 percent");

    let report = find(&events, "report_complete").unwrap();
    assert_eq!(report.data.as_ref().unwrap()["reliability_score"], 62.0);
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn fact_check_zero_claims_skips_verification() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("rep", Some("There is nothing concrete to verify here."));

    let mut config = config_with_models(&["f1", "f2"]);
    config.chairman_model = Some("rep".to_string());
    config.content_to_check = Some("An opinion piece.".to_string());
    let (events, _) = run(gateway, request(Mode::FactCheck, "check", config)).await;

    assert!(find(&events, "verify_start").is_none());
    let report = find(&events, "report_complete").unwrap();
    let data = report.data.as_ref().unwrap();
    assert!(data["reliability_score"].is_null());
    assert!(
        data["response"]
            .as_str()
            .unwrap()
            .to_lowercase()
            .contains("no verifiable claims")
    );
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn fact_check_bias_warning_when_generator_is_checker() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("f1", Some("Generated article text."));
    gateway.script("rep", Some("CLAIM 1: A fact\nContext: c\nType: TECHNICAL"));
    gateway.script(
        "f1",
        Some("VERIFICATION claim_1:\nVERDICT: VERIFIED\nEvidence: e\nCorrection: N/A\nConfidence: HIGH"),
    );
    gateway.script(
        "f2",
        Some("VERIFICATION claim_1:\nVERDICT: VERIFIED\nEvidence: e\nCorrection: N/A\nConfidence: HIGH"),
    );
    gateway.script("rep", Some("Reliability Score: 90"));

    let mut config = config_with_models(&["f1", "f2"]);
    config.chairman_model = Some("rep".to_string());
    config.generator_model = Some("f1".to_string());
    let (events, _) = run(gateway, request(Mode::FactCheck, "write and check", config)).await;

    let start = find(&events, "fact_check_start").unwrap();
    let warning = start.data.as_ref().unwrap()["warning"].as_str().unwrap();
    assert!(warning.contains("f1"));
    assert_eq!(events.last().unwrap().kind, "complete");
}
