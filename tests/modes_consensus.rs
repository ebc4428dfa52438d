//! Consensus-family runs: Council, Vote (tie → chairman), Delphi
//! convergence, Confidence-Weighted single responder.

mod common;

use std::sync::Arc;

use common::{FakeGateway, config_with_models, find, kinds, request, run};
use conclave::registry::Mode;

#[tokio::test]
async fn council_runs_collect_rank_synthesize() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("answer one"));
    gateway.script("m2", Some("answer two"));
    gateway.script("m1", Some("FINAL RANKING:\n1. Response B\n2. Response A"));
    gateway.script("m2", Some("FINAL RANKING:\n1. Response A\n2. Response B"));
    gateway.script("chair", Some("the definitive answer"));

    let mut config = config_with_models(&["m1", "m2"]);
    config.chairman_model = Some("chair".to_string());
    let (events, records) = run(gateway, request(Mode::Council, "What is Rust?", config)).await;

    let kinds = kinds(&events);
    assert_eq!(kinds[0], "council_start");
    assert_eq!(*kinds.last().unwrap(), "complete");
    assert!(!kinds.contains(&"error"));
    let expected = [
        "council_start",
        "collect_start",
        "collect_complete",
        "rank_start",
        "rank_complete",
        "synthesize_start",
        "synthesize_complete",
        "title_complete",
        "complete",
    ];
    assert_eq!(kinds, expected);

    let synthesis = find(&events, "synthesize_complete").unwrap();
    assert_eq!(
        synthesis.data.as_ref().unwrap()["response"],
        "the definitive answer"
    );

    // Both models received position 1 and 2 once each.
    let rank = find(&events, "rank_complete").unwrap();
    let rankings = rank.data.as_ref().unwrap()["rankings"].as_array().unwrap();
    assert_eq!(rankings.len(), 2);
    assert_eq!(rankings[0]["average_rank"], 1.5);

    // Stage records: 2 collect + 2 rank + 1 synthesize, in order.
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.stage_order as usize, i);
    }
}

#[tokio::test]
async fn vote_three_way_tie_broken_by_chairman() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m3", Some("C1"));
    gateway.script("m1", Some("VOTE: Response B"));
    gateway.script("m2", Some("VOTE: Response A"));
    gateway.script("m3", Some("VOTE: Response C"));
    gateway.script("chair", Some("VOTE: Response B"));

    let mut config = config_with_models(&["m1", "m2", "m3"]);
    config.chairman_model = Some("chair".to_string());
    let (events, _) = run(gateway, request(Mode::Vote, "pick one", config)).await;

    let tally = find(&events, "vote_complete").unwrap();
    assert_eq!(tally.data.as_ref().unwrap()["is_tie"], true);

    assert!(find(&events, "tiebreaker_start").is_some());
    let winner = find(&events, "winner_complete").unwrap();
    let data = winner.data.as_ref().unwrap();
    assert_eq!(data["label"], "Response B");
    assert_eq!(data["model"], "m2");
    assert_eq!(data["response"], "B1");
    assert_eq!(data["tiebroken"], true);
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn vote_tiebreak_double_parse_failure_goes_alphabetical() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("VOTE: Response B"));
    gateway.script("m2", Some("VOTE: Response A"));
    // Chairman never produces a parseable ballot.
    gateway.script("chair", Some("they are both fine"));
    gateway.script("chair", Some("still cannot decide"));

    let mut config = config_with_models(&["m1", "m2"]);
    config.chairman_model = Some("chair".to_string());
    let (events, _) = run(gateway, request(Mode::Vote, "pick one", config)).await;

    let winner = find(&events, "winner_complete").unwrap();
    // Alphabetically first tied label.
    assert_eq!(winner.data.as_ref().unwrap()["label"], "Response A");
}

#[tokio::test]
async fn vote_fatal_on_zero_parsed_ballots() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("I abstain"));
    gateway.script("m2", Some("no opinion"));

    let config = config_with_models(&["m1", "m2"]);
    let (events, records) = run(gateway, request(Mode::Vote, "pick one", config)).await;

    assert_eq!(events.last().unwrap().kind, "error");
    assert!(!kinds(&events).contains(&"complete"));
    // Partial stage records still persisted.
    assert!(!records.is_empty());
}

#[tokio::test]
async fn delphi_numeric_panel_converges_in_round_two() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("fac", Some("TYPE: numeric"));
    gateway.script("p1", Some("ESTIMATE: 100\nCONFIDENCE: MEDIUM"));
    gateway.script("p2", Some("ESTIMATE: 150\nCONFIDENCE: HIGH"));
    gateway.script("p3", Some("ESTIMATE: 120\nCONFIDENCE: MEDIUM"));
    gateway.script("p4", Some("ESTIMATE: 300\nCONFIDENCE: LOW"));
    gateway.script("p1", Some("ESTIMATE: 130\nCONFIDENCE: HIGH"));
    gateway.script("p2", Some("ESTIMATE: 140\nCONFIDENCE: HIGH"));
    gateway.script("p3", Some("ESTIMATE: 135\nCONFIDENCE: HIGH"));
    gateway.script("p4", Some("ESTIMATE: 145\nCONFIDENCE: MEDIUM"));
    gateway.script("fac", Some("The panel settled near 137."));

    let mut config = config_with_models(&["p1", "p2", "p3", "p4"]);
    config.chairman_model = Some("fac".to_string());
    config.max_rounds = Some(4);
    let shared = gateway.clone();
    let (events, _) = run(
        gateway,
        request(Mode::Delphi, "How many units will ship?", config),
    )
    .await;

    let rounds: Vec<_> = events.iter().filter(|e| e.kind == "round_complete").collect();
    assert_eq!(rounds.len(), 2, "converged after round 2, not before");
    let round1 = rounds[0].data.as_ref().unwrap();
    assert_eq!(round1["converged"], false);
    let round2 = rounds[1].data.as_ref().unwrap();
    assert_eq!(round2["converged"], true);
    assert_eq!(round2["numeric"]["median"], 137.5);

    let synthesis = find(&events, "synthesis_complete").unwrap();
    assert_eq!(synthesis.data.as_ref().unwrap()["final_value"], "137.5");
    assert_eq!(events.last().unwrap().kind, "complete");

    // Feedback prompts carry the panelist's own estimate and aggregate
    // statistics, never a peer's reply text.
    let feedback = shared
        .calls()
        .into_iter()
        .find(|(model, prompt)| model == "p1" && prompt.contains("Delphi round update"))
        .expect("p1 received a feedback prompt");
    assert!(feedback.1.contains("Your previous estimate: 100"));
    assert!(feedback.1.contains("mean 167.50"));
}

#[tokio::test]
async fn delphi_fatal_below_three_panelists() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("fac", Some("TYPE: numeric"));
    gateway.script("p1", Some("ESTIMATE: 10"));
    gateway.script("p2", Some("no estimate here at all"));
    // p3 fails outright.

    let mut config = config_with_models(&["p1", "p2", "p3"]);
    config.chairman_model = Some("fac".to_string());
    let (events, _) = run(gateway, request(Mode::Delphi, "estimate?", config)).await;

    assert_eq!(events.last().unwrap().kind, "error");
}

#[tokio::test]
async fn confidence_weighted_single_responder_skips_synthesis() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("The answer is 42.\nCONFIDENCE: 0.8"));
    // m2 fails.

    let mut config = config_with_models(&["m1", "m2"]);
    config.chairman_model = Some("synth".to_string());
    let (events, _) = run(
        gateway,
        request(Mode::ConfidenceWeighted, "what is the answer?", config),
    )
    .await;

    let weights = find(&events, "weights_complete").unwrap();
    let entries = weights.data.as_ref().unwrap()["weights"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["weight"], 1.0);

    let synthesis = find(&events, "synthesis_complete").unwrap();
    let data = synthesis.data.as_ref().unwrap();
    assert_eq!(data["single_answer"], true);
    // The survivor's response, verbatim.
    assert_eq!(data["synthesis"], "The answer is 42.\nCONFIDENCE: 0.8");
    assert!(
        data["calibration_notes"]
            .as_str()
            .unwrap()
            .contains("no cross-model calibration")
    );
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn confidence_weighted_weights_sorted_descending() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("Answer A.\nCONFIDENCE: 0.2"));
    gateway.script("m2", Some("Answer B.\nCONFIDENCE: 0.99"));
    gateway.script(
        "synth",
        Some("SYNTHESIS:\nCombined.\nCONFIDENCE CALIBRATION NOTES:\nB was an outlier."),
    );

    let mut config = config_with_models(&["m1", "m2"]);
    config.chairman_model = Some("synth".to_string());
    config.temperature = Some(0.3);
    let (events, _) = run(gateway, request(Mode::ConfidenceWeighted, "q", config)).await;

    let weights = find(&events, "weights_complete").unwrap();
    let entries = weights.data.as_ref().unwrap()["weights"].as_array().unwrap();
    assert_eq!(entries[0]["model"], "m2");
    assert_eq!(entries[0]["outlier"], true);
    assert!(entries[0]["weight"].as_f64().unwrap() > entries[1]["weight"].as_f64().unwrap());

    let synthesis = find(&events, "synthesis_complete").unwrap();
    assert_eq!(synthesis.data.as_ref().unwrap()["synthesis"], "Combined.");
}
