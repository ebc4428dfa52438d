//! Dispatcher validation, terminal events, title handling, wire framing,
//! and stage persistence.

mod common;

use std::sync::Arc;

use common::{FakeGateway, config_with_models, find, kinds, request, run};
use conclave::dispatcher::{FALLBACK_TITLE, clean_title};
use conclave::events::Event;
use conclave::registry::{MODES, Mode, mode_def};

#[tokio::test]
async fn model_count_violation_is_a_single_error_event() {
    let gateway = Arc::new(FakeGateway::new());
    // Jury requires at least 3 models.
    let config = config_with_models(&["j1", "j2"]);
    let (events, records) = run(gateway, request(Mode::Jury, "judge", config)).await;

    assert_eq!(kinds(&events), vec!["error"]);
    assert!(events[0].message.as_ref().unwrap().contains("jury"));
    assert!(records.is_empty());
}

#[tokio::test]
async fn title_call_result_is_cleaned_and_emitted() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("VOTE: Response B"));
    gateway.script("m2", Some("VOTE: Response B"));
    gateway.script("titler", Some("\"Rust Memory Safety\"\n"));

    let config = config_with_models(&["m1", "m2"]);
    let (events, _) = run(gateway, request(Mode::Vote, "q", config)).await;

    let title = find(&events, "title_complete").unwrap();
    assert_eq!(title.data.as_ref().unwrap()["title"], "Rust Memory Safety");
    // title_complete precedes complete.
    let kinds = kinds(&events);
    let title_at = kinds.iter().position(|k| *k == "title_complete").unwrap();
    let complete_at = kinds.iter().position(|k| *k == "complete").unwrap();
    assert!(title_at < complete_at);
}

#[tokio::test]
async fn title_failure_falls_back() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("VOTE: Response A"));
    gateway.script("m2", Some("VOTE: Response A"));
    // titler unscripted — the title call fails, non-fatally.

    let config = config_with_models(&["m1", "m2"]);
    let (events, _) = run(gateway, request(Mode::Vote, "q", config)).await;

    let title = find(&events, "title_complete").unwrap();
    assert_eq!(title.data.as_ref().unwrap()["title"], FALLBACK_TITLE);
    assert_eq!(events.last().unwrap().kind, "complete");
}

#[test]
fn clean_title_rules() {
    assert_eq!(clean_title("\"Vote Results\""), "Vote Results");
    assert_eq!(clean_title("'Quoted'\nsecond line"), "Quoted");
    assert_eq!(clean_title("   "), FALLBACK_TITLE);
    let long = "x".repeat(80);
    let cleaned = clean_title(&long);
    assert_eq!(cleaned.chars().count(), 50);
    assert!(cleaned.ends_with('…'));
}

#[test]
fn event_frames_follow_the_wire_protocol() {
    let event = Event::with("vote_complete", &serde_json::json!({ "voters": 3 }));
    let frame = event.frame();
    assert!(frame.starts_with("data: {"));
    assert!(frame.ends_with("\n\n"));
    let json: serde_json::Value =
        serde_json::from_str(frame.trim_start_matches("data: ").trim()).unwrap();
    assert_eq!(json["type"], "vote_complete");
    assert_eq!(json["data"]["voters"], 3);
    assert!(json.get("message").is_none());

    let error = Event::error("something broke");
    let frame = error.frame();
    let json: serde_json::Value =
        serde_json::from_str(frame.trim_start_matches("data: ").trim()).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "something broke");
}

#[tokio::test]
async fn stage_orders_are_monotonic_and_persisted() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("VOTE: Response A"));
    gateway.script("m2", Some("VOTE: Response A"));

    let config = config_with_models(&["m1", "m2"]);
    let (_, records) = run(gateway, request(Mode::Vote, "q", config)).await;

    assert!(!records.is_empty());
    for window in records.windows(2) {
        assert!(window[0].stage_order < window[1].stage_order);
    }
    // Stage records round-trip through serialization.
    let json = serde_json::to_string(&records).unwrap();
    let back: Vec<conclave::stages::StageRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.len(), records.len());
}

#[test]
fn registry_covers_all_fifteen_modes() {
    assert_eq!(MODES.len(), 15);
    for def in &MODES {
        assert!(def.min_models >= 1);
        assert!(def.max_models >= def.min_models);
        assert_eq!(mode_def(def.id).name, def.name);
        // Wire name round-trips.
        assert_eq!(Mode::parse(def.id.as_str()).unwrap(), def.id);
    }
    assert!(Mode::parse("galactic_senate").is_err());
}

#[tokio::test]
async fn first_event_is_mode_start_and_last_is_complete() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.script("m1", Some("A1"));
    gateway.script("m2", Some("B1"));
    gateway.script("m1", Some("VOTE: Response A"));
    gateway.script("m2", Some("VOTE: Response A"));

    let config = config_with_models(&["m1", "m2"]);
    let (events, _) = run(gateway, request(Mode::Vote, "q", config)).await;

    assert_eq!(events.first().unwrap().kind, "vote_start");
    assert_eq!(events.last().unwrap().kind, "complete");
    assert!(!kinds(&events).contains(&"error"));
}
