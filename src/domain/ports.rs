use crate::domain::model::{DraftFile, DraftFileRecord, DraftSummary};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Something a caller can attach to a draft field.
pub trait FileSource: Send + Sync {
    fn name(&self) -> &str;
    fn content_type(&self) -> &str;
    fn read_bytes(&self) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
}

impl FileSource for DraftFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// Record-level storage engine behind the draft store. Every method is a
/// single transaction.
#[async_trait]
pub trait DraftFileBackend: Send + Sync {
    /// Insert or replace the record under its key.
    async fn put(&self, record: DraftFileRecord) -> Result<()>;

    /// All records of a draft, in no particular order.
    async fn records_for_draft(&self, draft_id: &str) -> Result<Vec<DraftFileRecord>>;

    async fn delete_field(&self, draft_id: &str, field_name: &str) -> Result<usize>;

    async fn delete_draft(&self, draft_id: &str) -> Result<usize>;

    async fn clear(&self) -> Result<usize>;

    async fn count_for_draft(&self, draft_id: &str) -> Result<u64>;

    async fn summaries(&self) -> Result<Vec<DraftSummary>>;
}
