//! Durable JSON-file history store. The whole log is rewritten through a
//! temp-file rename on every mutation, so interleaved completions never
//! leave a partially written record visible, and every append is flushed
//! before the call returns.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use rust_decimal::Decimal;

use hourcast_core::domain::history::HistoryRecord;
use hourcast_core::learning::{HistoryStore, HistoryStoreError};

pub struct JsonFileHistoryStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles across interleaved requests.
    guard: Mutex<()>,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|error| HistoryStoreError::Serialization(error.to_string())),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(HistoryStoreError::Io(error.to_string())),
        }
    }

    async fn write_records(&self, records: &[HistoryRecord]) -> Result<(), HistoryStoreError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|error| HistoryStoreError::Serialization(error.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|error| HistoryStoreError::Io(error.to_string()))?;
            }
        }

        // Write-then-rename keeps the visible file whole at all times.
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|error| HistoryStoreError::Io(error.to_string()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|error| HistoryStoreError::Io(error.to_string()))?;

        debug!(
            event_name = "history.flushed",
            path = %self.path.display(),
            record_count = records.len(),
            "history log persisted"
        );
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryStoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await?;
        records.push(record);
        self.write_records(&records).await
    }

    async fn update_most_recent(
        &self,
        ticket: &str,
        actual_hours: Decimal,
    ) -> Result<bool, HistoryStoreError> {
        let _guard = self.guard.lock().await;
        let mut records = self.read_records().await?;

        let Some(record) = records.iter_mut().rev().find(|record| record.ticket == ticket)
        else {
            return Ok(false);
        };
        record.record_actual(actual_hours);

        self.write_records(&records).await?;
        Ok(true)
    }

    async fn load_all(&self) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        let _guard = self.guard.lock().await;
        self.read_records().await
    }
}
