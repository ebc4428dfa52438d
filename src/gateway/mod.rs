pub mod http;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::stages::ConversationTurn;

/// A successful single-model reply.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub response_time_ms: u64,
}

/// The two primitives the orchestration core consumes: query one model,
/// query several in parallel. Failures are call-site-visible as absence —
/// `query_one` returns `None` on transport error, non-2xx, or timeout, and
/// `query_many` simply omits the failed model from its result map. One
/// sibling's failure never affects the others.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn query_one(&self, model: &str, prompt: &str, timeout: Duration) -> Option<ModelReply>;

    /// Single-model call with prior conversation turns, for multi-turn modes.
    async fn query_one_with_messages(
        &self,
        model: &str,
        turns: &[ConversationTurn],
        timeout: Duration,
    ) -> Option<ModelReply>;

    async fn query_many(
        &self,
        models: &[String],
        prompt: &str,
        timeout: Duration,
    ) -> HashMap<String, ModelReply> {
        let futures = models.iter().map(|m| async move {
            let reply = self.query_one(m, prompt, timeout).await;
            (m.clone(), reply)
        });
        futures_util::future::join_all(futures)
            .await
            .into_iter()
            .filter_map(|(m, r)| r.map(|r| (m, r)))
            .collect()
    }

    async fn query_many_with_messages(
        &self,
        models: &[String],
        turns: &[ConversationTurn],
        timeout: Duration,
    ) -> HashMap<String, ModelReply> {
        let futures = models.iter().map(|m| async move {
            let reply = self.query_one_with_messages(m, turns, timeout).await;
            (m.clone(), reply)
        });
        futures_util::future::join_all(futures)
            .await
            .into_iter()
            .filter_map(|(m, r)| r.map(|r| (m, r)))
            .collect()
    }
}
