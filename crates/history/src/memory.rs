//! In-memory history store for tests and ephemeral runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use hourcast_core::domain::history::HistoryRecord;
use hourcast_core::learning::{HistoryStore, HistoryStoreError};

#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), HistoryStoreError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn update_most_recent(
        &self,
        ticket: &str,
        actual_hours: Decimal,
    ) -> Result<bool, HistoryStoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().rev().find(|record| record.ticket == ticket)
        else {
            return Ok(false);
        };
        record.record_actual(actual_hours);
        Ok(true)
    }

    async fn load_all(&self) -> Result<Vec<HistoryRecord>, HistoryStoreError> {
        Ok(self.records.read().await.clone())
    }
}
