use crate::adapters::MemoryBackend;
use crate::core::{DraftFileBackend, DraftFileRecord, DraftFiles, DraftSummary, FileSource};
use crate::utils::error::{DraftStoreError, Result};
use chrono::Utc;
use std::sync::Arc;

/// Staging area for files attached to drafts that have not been submitted
/// yet.
///
/// Records are keyed by `(draft_id, field_name, file_index)`. Both ids are
/// opaque to the store. Cloning is cheap and every clone shares the same
/// backend.
#[derive(Clone)]
pub struct DraftFileStore {
    backend: Arc<dyn DraftFileBackend>,
    max_file_bytes: Option<u64>,
}

impl DraftFileStore {
    pub fn new<B: DraftFileBackend + 'static>(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    pub fn from_shared(backend: Arc<dyn DraftFileBackend>) -> Self {
        Self {
            backend,
            max_file_bytes: None,
        }
    }

    /// A store whose files are lost when the process exits.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Reject files larger than `limit` bytes at save time. `None` disables the check.
    pub fn with_max_file_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_file_bytes = limit;
        self
    }

    /// Save one file under `(draft_id, field_name, index)`, replacing whatever
    /// was stored under that exact key. `index` defaults to 0.
    ///
    /// The file's bytes are read into memory before the write starts.
    pub async fn save_file<F: FileSource>(
        &self,
        draft_id: &str,
        field_name: &str,
        file: &F,
        index: Option<u32>,
    ) -> Result<()> {
        let file_index = index.unwrap_or(0);
        let file_data = file.read_bytes().await?;

        if let Some(limit) = self.max_file_bytes {
            let size = file_data.len() as u64;
            if size > limit {
                return Err(DraftStoreError::FileTooLarge {
                    name: file.name().to_string(),
                    size,
                    limit,
                });
            }
        }

        tracing::debug!(
            draft_id,
            field_name,
            file_index,
            bytes = file_data.len(),
            "Saving draft file {}",
            file.name()
        );

        self.backend
            .put(DraftFileRecord {
                draft_id: draft_id.to_string(),
                field_name: field_name.to_string(),
                file_index,
                file_name: file.name().to_string(),
                file_type: file.content_type().to_string(),
                file_data,
                saved_at: Utc::now(),
            })
            .await
    }

    /// Replace every file of a field with `files`, indexed by position.
    ///
    /// This is not atomic. The field's old records are deleted in one
    /// transaction and each new file is then written in its own, in order.
    /// If a later step fails the error is returned and the field keeps the
    /// files written before the failure: the old files are gone and only a
    /// prefix of the new list is stored. Callers that need to know the final
    /// state should reload or save again.
    pub async fn save_files<F: FileSource>(
        &self,
        draft_id: &str,
        field_name: &str,
        files: &[F],
    ) -> Result<()> {
        let removed = self.backend.delete_field(draft_id, field_name).await?;
        tracing::debug!(
            draft_id,
            field_name,
            removed,
            incoming = files.len(),
            "Replacing draft field files"
        );

        for (index, file) in (0u32..).zip(files) {
            self.save_file(draft_id, field_name, file, Some(index)).await?;
        }
        Ok(())
    }

    /// Every file of a draft grouped by field name, each group ascending by
    /// file index. A draft with nothing stored yields an empty map.
    pub async fn load_files(&self, draft_id: &str) -> Result<DraftFiles> {
        let records = self.backend.records_for_draft(draft_id).await?;
        tracing::debug!(draft_id, records = records.len(), "Loaded draft files");
        Ok(group_records(records))
    }

    /// Remove all files of one field. Returns how many were removed.
    pub async fn delete_field_files(&self, draft_id: &str, field_name: &str) -> Result<usize> {
        let removed = self.backend.delete_field(draft_id, field_name).await?;
        tracing::debug!(draft_id, field_name, removed, "Deleted draft field files");
        Ok(removed)
    }

    /// Remove all files of one draft. A draft with no files is not an error.
    pub async fn delete_draft_files(&self, draft_id: &str) -> Result<usize> {
        let removed = self.backend.delete_draft(draft_id).await?;
        tracing::debug!(draft_id, removed, "Deleted draft files");
        Ok(removed)
    }

    /// Remove every file of every draft.
    pub async fn delete_all_files(&self) -> Result<usize> {
        let removed = self.backend.clear().await?;
        tracing::info!(removed, "Cleared all draft files");
        Ok(removed)
    }

    pub async fn has_files(&self, draft_id: &str) -> Result<bool> {
        Ok(self.backend.count_for_draft(draft_id).await? > 0)
    }

    /// One summary per draft holding files, ordered by draft id.
    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>> {
        self.backend.summaries().await
    }
}

impl std::fmt::Debug for DraftFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftFileStore")
            .field("max_file_bytes", &self.max_file_bytes)
            .finish_non_exhaustive()
    }
}

fn group_records(records: Vec<DraftFileRecord>) -> DraftFiles {
    let mut grouped: std::collections::BTreeMap<String, Vec<DraftFileRecord>> =
        std::collections::BTreeMap::new();
    for record in records {
        grouped
            .entry(record.field_name.clone())
            .or_default()
            .push(record);
    }

    grouped
        .into_iter()
        .map(|(field_name, mut records)| {
            records.sort_by_key(|record| record.file_index);
            let files = records.into_iter().map(DraftFileRecord::into_file).collect();
            (field_name, files)
        })
        .collect()
}
