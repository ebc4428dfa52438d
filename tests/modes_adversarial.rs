//! Adversarial-family runs: Debate, Tournament, Red Team.

mod common;

use std::sync::Arc;

use common::{FakeGateway, config_with_models, find, kinds, request, run};
use conclave::registry::Mode;

#[tokio::test]
async fn debate_carries_original_through_parse_failure() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("d1", Some("Alpha answer"));
    gateway.script("d2", Some("Beta answer"));
    gateway.script("d3", Some("Gamma answer"));
    gateway.script("d1", Some("DECISION: STAND"));
    // d2 emits no DECISION marker at all.
    gateway.script("d2", Some("I believe my answer holds up well."));
    gateway.script("d3", Some("DECISION: REVISE\nGamma answer v2"));
    gateway.script("d1", Some("VOTE: Response A"));
    gateway.script("d2", Some("VOTE: Response A"));
    gateway.script("d3", Some("VOTE: Response A"));

    let config = config_with_models(&["d1", "d2", "d3"]);
    let (events, _) = run(gateway, request(Mode::Debate, "debate this", config)).await;

    let revision = find(&events, "revision_complete").unwrap();
    let entries = revision.data.as_ref().unwrap()["revisions"]
        .as_array()
        .unwrap()
        .clone();
    let d2 = entries.iter().find(|e| e["model"] == "d2").unwrap();
    assert_eq!(d2["parse_success"], false);
    assert_eq!(d2["decision"], "STAND");
    let d3 = entries.iter().find(|e| e["model"] == "d3").unwrap();
    assert_eq!(d3["decision"], "REVISE");

    // Unanimous ballot under the shuffled round-2 map — the winner is
    // whichever revised body sits behind label A.
    let winner = find(&events, "winner_complete").unwrap();
    let response = winner.data.as_ref().unwrap()["response"].as_str().unwrap();
    assert!(
        ["Alpha answer", "Beta answer", "Gamma answer v2"].contains(&response),
        "unexpected winner body: {response}"
    );
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn debate_fatal_below_two_debaters() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("d1", Some("only answer"));

    let config = config_with_models(&["d1", "d2"]);
    let (events, _) = run(gateway, request(Mode::Debate, "debate this", config)).await;
    assert_eq!(events.last().unwrap().kind, "error");
}

#[tokio::test]
async fn tournament_bye_and_champion_path() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("t1", Some("R1"));
    gateway.script("t2", Some("R2"));
    gateway.script("t3", Some("R3"));
    // Round 1: (t1 vs t2) judged, t3 byes.
    gateway.script("judge", Some("WINNER: Response A"));
    // Round 2: (t1 vs t3).
    gateway.script("judge", Some("WINNER: Response B"));

    let mut config = config_with_models(&["t1", "t2", "t3"]);
    config.judge_model = Some("judge".to_string());
    let (events, _) = run(gateway, request(Mode::Tournament, "best answer wins", config)).await;

    let seeding = find(&events, "seeding_complete").unwrap();
    assert_eq!(seeding.data.as_ref().unwrap()["rounds"], 2);

    let winner = find(&events, "winner_complete").unwrap();
    let data = winner.data.as_ref().unwrap();
    assert_eq!(data["model"], "t3");
    // Unmodified original stage-1 response.
    assert_eq!(data["response"], "R3");
    // N - 1 real matchups.
    assert_eq!(data["total_matchups"], 2);

    let path = data["bracket_path"].as_array().unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path[0]["result"], "bye");
    assert_eq!(path[1]["result"], "won");
    assert_eq!(path[1]["opponent"], "t1");
}

#[tokio::test]
async fn tournament_judge_failure_default_advances_contestant_a() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("t1", Some("R1"));
    gateway.script("t2", Some("R2"));
    // Judge never responds (initial call + retry both fail).

    let mut config = config_with_models(&["t1", "t2"]);
    config.judge_model = Some("judge".to_string());
    let (events, _) = run(gateway, request(Mode::Tournament, "q", config)).await;

    let winner = find(&events, "winner_complete").unwrap();
    assert_eq!(winner.data.as_ref().unwrap()["model"], "t1");

    let matchups = find(&events, "matchups_complete").unwrap();
    let first = &matchups.data.as_ref().unwrap()["matchups"][0];
    assert_eq!(first["was_default"], true);
}

#[tokio::test]
async fn tournament_strict_retry_recovers_unparseable_verdict() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("t1", Some("R1"));
    gateway.script("t2", Some("R2"));
    gateway.script("judge", Some("both are impressive efforts"));
    gateway.script("judge", Some("WINNER: Response B"));

    let mut config = config_with_models(&["t1", "t2"]);
    config.judge_model = Some("judge".to_string());
    let (events, _) = run(gateway, request(Mode::Tournament, "q", config)).await;

    let winner = find(&events, "winner_complete").unwrap();
    assert_eq!(winner.data.as_ref().unwrap()["model"], "t2");
    let matchups = find(&events, "matchups_complete").unwrap();
    assert_eq!(
        matchups.data.as_ref().unwrap()["matchups"][0]["was_default"],
        false
    );
}

#[tokio::test]
async fn red_team_accept_replaces_content_for_synthesis() {
    let gateway = Arc::new(FakeGateway::new());
    // generate (gen), attack (att), defend (gen), synthesize (gen).
    gateway.script("gen", Some("Original content"));
    gateway.script(
        "att",
        Some("FINDING 1: Issue X\nSeverity: HIGH\nThe claim is wrong."),
    );
    gateway.script(
        "gen",
        Some("RESPONSE TO FINDING 1:\nVerdict: ACCEPT\nREVISED: Hardened content"),
    );
    gateway.script("gen", Some("Final hardened output"));

    let mut config = config_with_models(&["gen", "att"]);
    config.rounds = Some(1);
    let shared = gateway.clone();
    let (events, _) = run(gateway, request(Mode::RedTeam, "harden this", config)).await;

    let attack = find(&events, "attack_complete").unwrap();
    assert_eq!(attack.data.as_ref().unwrap()["findings"], 1);

    let defend = find(&events, "defend_complete").unwrap();
    assert_eq!(defend.data.as_ref().unwrap()["accepted"], 1);

    let synthesis = find(&events, "synthesize_complete").unwrap();
    let data = synthesis.data.as_ref().unwrap();
    assert_eq!(data["total_findings"], 1);
    assert_eq!(data["overall_risk"], "HIGH");
    assert_eq!(data["response"], "Final hardened output");

    // The accepted revision became the content the synthesizer saw.
    let synth_call = shared
        .calls()
        .into_iter()
        .filter(|(model, _)| model == "gen")
        .next_back()
        .unwrap();
    assert!(synth_call.1.contains("Hardened content"));
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[tokio::test]
async fn red_team_zero_findings_skips_remaining_rounds() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("gen", Some("Clean content"));
    gateway.script("att", Some("I found no real flaws."));
    gateway.script("gen", Some("Already solid."));

    let mut config = config_with_models(&["gen", "att"]);
    config.rounds = Some(3);
    let (events, _) = run(gateway, request(Mode::RedTeam, "check this", config)).await;

    // One attack, no defend, straight to synthesis.
    let attack_count = kinds(&events)
        .iter()
        .filter(|k| **k == "attack_complete")
        .count();
    assert_eq!(attack_count, 1);
    assert!(find(&events, "defend_start").is_none());
    assert!(find(&events, "synthesize_complete").is_some());
    assert_eq!(events.last().unwrap().kind, "complete");
}
