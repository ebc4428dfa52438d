use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::stages::StageRecord;

static PERSIST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persistence collaborator: receives a run's ordered stage records on exit.
/// Storage must be atomic per `message_id`; failure is surfaced to the
/// caller but never loses the in-memory records.
#[async_trait]
pub trait StageStore: Send + Sync {
    async fn store(
        &self,
        conversation_id: &str,
        message_id: &str,
        records: &[StageRecord],
    ) -> std::io::Result<()>;
}

/// Writes each run to `.conclave/runs/{ts}_{pid}_{seq}.json`.
/// Epoch millis + PID + atomic counter keep filenames unique across
/// concurrent runs and concurrent processes.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new() -> Self {
        Self {
            dir: PathBuf::from(".conclave/runs"),
        }
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Default for JsonFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageStore for JsonFileStore {
    async fn store(
        &self,
        conversation_id: &str,
        message_id: &str,
        records: &[StageRecord],
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let pid = std::process::id();
        let seq = PERSIST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("{ts}_{pid}_{seq}.json"));

        let payload = serde_json::json!({
            "conversation_id": conversation_id,
            "message_id": message_id,
            "stages": records,
        });
        let json = serde_json::to_string_pretty(&payload).map_err(std::io::Error::other)?;

        // Atomic write: temp file + rename prevents partial reads.
        // Clean up the temp file on ANY failure (write or rename).
        let tmp_path = path.with_extension("tmp");
        if let Err(e) = tokio::fs::write(&tmp_path, json.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        Ok(())
    }
}

/// In-memory store for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    runs: Mutex<Vec<(String, String, Vec<StageRecord>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<(String, String, Vec<StageRecord>)> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl StageStore for MemoryStore {
    async fn store(
        &self,
        conversation_id: &str,
        message_id: &str,
        records: &[StageRecord],
    ) -> std::io::Result<()> {
        self.runs.lock().await.push((
            conversation_id.to_string(),
            message_id.to_string(),
            records.to_vec(),
        ));
        Ok(())
    }
}
