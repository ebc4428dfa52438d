//! Shared test scaffolding: a scripted fake gateway and a driver that runs
//! one deliberation and captures its event stream and stage records.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use conclave::config::Config;
use conclave::dispatcher::Deliberation;
use conclave::events::{Event, EventSink};
use conclave::gateway::{ModelGateway, ModelReply};
use conclave::registry::Mode;
use conclave::request::{DeliberationRequest, ModeConfig};
use conclave::stages::{ConversationTurn, StageRecord};
use conclave::store::MemoryStore;

/// Scripted gateway: each model has a FIFO of replies; `None` entries (and
/// exhausted queues) simulate transport failure. Every call is recorded.
#[derive(Default)]
pub struct FakeGateway {
    scripts: Mutex<HashMap<String, VecDeque<Option<String>>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, model: &str, reply: Option<&str>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(reply.map(str::to_string));
    }

    /// (model, prompt) pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, model: &str, prompt: &str) -> Option<ModelReply> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), prompt.to_string()));
        self.scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(|q| q.pop_front())
            .flatten()
            .map(|content| ModelReply {
                content,
                response_time_ms: 5,
            })
    }
}

#[async_trait]
impl ModelGateway for FakeGateway {
    async fn query_one(&self, model: &str, prompt: &str, _timeout: Duration) -> Option<ModelReply> {
        self.next(model, prompt)
    }

    async fn query_one_with_messages(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        _timeout: Duration,
    ) -> Option<ModelReply> {
        let prompt = turns.last().map(|t| t.content.clone()).unwrap_or_default();
        self.next(model, &prompt)
    }
}

pub fn test_config() -> Config {
    Config {
        base_url: "http://localhost/unused".to_string(),
        api_key: None,
        default_models: Vec::new(),
        title_model: "titler".to_string(),
        timeout: Duration::from_secs(5),
    }
}

pub fn request(mode: Mode, question: &str, config: ModeConfig) -> DeliberationRequest {
    DeliberationRequest {
        question: question.to_string(),
        mode,
        conversation_id: None,
        mode_config: Some(config),
        history: Vec::new(),
    }
}

pub fn config_with_models(models: &[&str]) -> ModeConfig {
    ModeConfig {
        models: Some(models.iter().map(|m| m.to_string()).collect()),
        ..ModeConfig::default()
    }
}

/// Run one deliberation against the fake gateway; returns the full event
/// stream and the persisted stage records.
pub async fn run(
    gateway: Arc<FakeGateway>,
    request: DeliberationRequest,
) -> (Vec<Event>, Vec<StageRecord>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Deliberation::new(test_config(), gateway, store);
    let (sink, mut rx) = EventSink::channel();
    let records = engine.run(request, sink).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (events, records)
}

pub fn kinds(events: &[Event]) -> Vec<&str> {
    events.iter().map(|e| e.kind.as_str()).collect()
}

pub fn find<'a>(events: &'a [Event], kind: &str) -> Option<&'a Event> {
    events.iter().find(|e| e.kind == kind)
}
