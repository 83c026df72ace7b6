//! Interaction log: routed answers are queued and appended to `interactions.jsonl` by a single
//! background task, with a copy in `backups/` every `backup_every` records.

use crate::error::StoreError;
use crate::jsonl;
use crate::router::AnswerSource;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const LOG_FILE: &str = "interactions.jsonl";
pub const BACKUPS_DIR: &str = "backups";

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp_ms: i64,
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
}

impl InteractionRecord {
    pub fn now(question: impl Into<String>, answer: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            timestamp_ms: jsonl::now_ms(),
            question: question.into(),
            answer: answer.into(),
            source,
        }
    }
}

/// Where the router reports answers. Must not block the caller.
pub trait InteractionSink: Send + Sync {
    fn record(&self, record: InteractionRecord);
}

/// Sink that drops everything.
pub struct NullSink;

impl InteractionSink for NullSink {
    fn record(&self, _record: InteractionRecord) {}
}

enum LogMessage {
    Record(InteractionRecord),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background log writer.
#[derive(Clone)]
pub struct InteractionLog {
    tx: mpsc::Sender<LogMessage>,
    path: PathBuf,
}

impl InteractionLog {
    /// Starts the writer task on the current runtime. `backup_every == 0` disables backups.
    pub async fn spawn(
        dir: &Path,
        capacity: usize,
        backup_every: u64,
    ) -> Result<(Self, JoinHandle<()>), StoreError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;
        let path = dir.join(LOG_FILE);
        let writer = LogWriter {
            count: jsonl::count_lines(&path).await,
            path: path.clone(),
            backups: dir.join(BACKUPS_DIR),
            backup_every,
        };
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(writer.run(rx));
        tracing::info!(target: "dspace::interaction", file = %path.display(), capacity, "interaction log started");
        Ok((Self { tx, path }, handle))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits until every record queued before this call is on disk.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(LogMessage::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// All records, newest first.
    pub async fn read_entries(&self) -> Result<Vec<InteractionRecord>, StoreError> {
        self.flush().await;
        let mut records: Vec<InteractionRecord> = jsonl::read_all(&self.path).await?;
        records.reverse();
        Ok(records)
    }

    /// Raw file contents for download.
    pub async fn export(&self) -> Result<Vec<u8>, StoreError> {
        self.flush().await;
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

impl InteractionSink for InteractionLog {
    fn record(&self, record: InteractionRecord) {
        match self.tx.try_send(LogMessage::Record(record)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(target: "dspace::interaction", "log queue full, record dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(target: "dspace::interaction", "log writer stopped, record dropped")
            }
        }
    }
}

struct LogWriter {
    path: PathBuf,
    backups: PathBuf,
    backup_every: u64,
    count: u64,
}

impl LogWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<LogMessage>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                LogMessage::Record(record) => self.write(&record).await,
                LogMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        tracing::debug!(target: "dspace::interaction", "interaction log writer stopped");
    }

    async fn write(&mut self, record: &InteractionRecord) {
        if let Err(e) = jsonl::append(&self.path, record).await {
            tracing::error!(target: "dspace::interaction", error = %e, "failed to append interaction");
            return;
        }
        self.count += 1;
        tracing::debug!(target: "dspace::interaction", source = ?record.source, total = self.count, "interaction saved");
        if self.backup_every > 0 && self.count % self.backup_every == 0 {
            if let Err(e) = self.backup().await {
                tracing::error!(target: "dspace::interaction", error = %e, "interaction log backup failed");
            }
        }
    }

    async fn backup(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.backups)
            .await
            .map_err(|e| StoreError::io(&self.backups, e))?;
        let target = self
            .backups
            .join(format!("interactions_{}_{}.jsonl", jsonl::now_ms(), self.count));
        tokio::fs::copy(&self.path, &target)
            .await
            .map_err(|e| StoreError::io(&target, e))?;
        tracing::info!(target: "dspace::interaction", file = %target.display(), "interaction log backed up");
        Ok(())
    }
}
