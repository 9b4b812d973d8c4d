use crate::domain::model::{DraftFileRecord, DraftSummary, RecordKey};
use crate::domain::ports::DraftFileBackend;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Non-durable backend. Records live only as long as the process; used when
/// draft persistence is unavailable or not wanted.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<RecordKey, DraftFileRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

// Keys sort by draft id first, so one draft's records form a contiguous range.
fn draft_range<'a>(
    records: &'a BTreeMap<RecordKey, DraftFileRecord>,
    draft_id: &'a str,
) -> impl Iterator<Item = (&'a RecordKey, &'a DraftFileRecord)> + 'a {
    records
        .range(RecordKey::new(draft_id, "", 0)..)
        .take_while(move |(key, _)| key.draft_id == draft_id)
}

#[async_trait]
impl DraftFileBackend for MemoryBackend {
    async fn put(&self, record: DraftFileRecord) -> Result<()> {
        self.records.write().await.insert(record.key(), record);
        Ok(())
    }

    async fn records_for_draft(&self, draft_id: &str) -> Result<Vec<DraftFileRecord>> {
        let records = self.records.read().await;
        let found: Vec<DraftFileRecord> = draft_range(&records, draft_id)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(found)
    }

    async fn delete_field(&self, draft_id: &str, field_name: &str) -> Result<usize> {
        let mut records = self.records.write().await;
        let keys: Vec<RecordKey> = draft_range(&records, draft_id)
            .filter(|(key, _)| key.field_name == field_name)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            records.remove(key);
        }
        Ok(keys.len())
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<usize> {
        let mut records = self.records.write().await;
        let keys: Vec<RecordKey> = draft_range(&records, draft_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            records.remove(key);
        }
        Ok(keys.len())
    }

    async fn clear(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn count_for_draft(&self, draft_id: &str) -> Result<u64> {
        let records = self.records.read().await;
        let count = draft_range(&records, draft_id).count();
        Ok(count as u64)
    }

    async fn summaries(&self) -> Result<Vec<DraftSummary>> {
        let records = self.records.read().await;
        let mut summaries: Vec<DraftSummary> = Vec::new();
        for record in records.values() {
            match summaries.last_mut() {
                Some(last) if last.draft_id == record.draft_id => {
                    last.file_count += 1;
                    last.total_bytes += record.file_data.len() as u64;
                }
                _ => summaries.push(DraftSummary {
                    draft_id: record.draft_id.clone(),
                    file_count: 1,
                    total_bytes: record.file_data.len() as u64,
                }),
            }
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(draft_id: &str, field_name: &str, file_index: u32) -> DraftFileRecord {
        DraftFileRecord {
            draft_id: draft_id.to_string(),
            field_name: field_name.to_string(),
            file_index,
            file_name: "photo.png".to_string(),
            file_type: "image/png".to_string(),
            file_data: vec![1, 2, 3],
            saved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_draft_range_does_not_leak_into_prefixed_ids() {
        let backend = MemoryBackend::new();
        backend.put(record("d1", "mainImage", 0)).await.unwrap();
        backend.put(record("d10", "mainImage", 0)).await.unwrap();
        backend.put(record("d1", "section-0", 0)).await.unwrap();

        assert_eq!(backend.count_for_draft("d1").await.unwrap(), 2);
        assert_eq!(backend.count_for_draft("d10").await.unwrap(), 1);
        assert_eq!(backend.count_for_draft("d").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_field_only_touches_that_field() {
        let backend = MemoryBackend::new();
        backend.put(record("d1", "mainImage", 0)).await.unwrap();
        backend.put(record("d1", "section-0", 0)).await.unwrap();
        backend.put(record("d1", "section-0", 1)).await.unwrap();

        assert_eq!(backend.delete_field("d1", "section-0").await.unwrap(), 2);
        let remaining = backend.records_for_draft("d1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].field_name, "mainImage");
    }

    #[tokio::test]
    async fn test_summaries() {
        let backend = MemoryBackend::new();
        backend.put(record("b", "mainImage", 0)).await.unwrap();
        backend.put(record("a", "mainImage", 0)).await.unwrap();
        backend.put(record("a", "mainImage", 1)).await.unwrap();

        let summaries = backend.summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].draft_id, "a");
        assert_eq!(summaries[0].file_count, 2);
        assert_eq!(summaries[0].total_bytes, 6);
        assert_eq!(summaries[1].draft_id, "b");
    }
}
