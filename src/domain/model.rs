use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Identity of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub draft_id: String,
    pub field_name: String,
    pub file_index: u32,
}

impl RecordKey {
    pub fn new(draft_id: impl Into<String>, field_name: impl Into<String>, file_index: u32) -> Self {
        Self {
            draft_id: draft_id.into(),
            field_name: field_name.into(),
            file_index,
        }
    }
}

/// One stored file plus its identifying keys and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftFileRecord {
    pub draft_id: String,
    pub field_name: String,
    pub file_index: u32,
    pub file_name: String,
    pub file_type: String,
    pub file_data: Vec<u8>,
    pub saved_at: DateTime<Utc>,
}

impl DraftFileRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.draft_id, &self.field_name, self.file_index)
    }

    pub fn into_file(self) -> DraftFile {
        DraftFile {
            name: self.file_name,
            content_type: self.file_type,
            data: self.file_data,
        }
    }
}

/// A file handle as callers see it: bytes plus the name and MIME type a
/// multipart upload needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl DraftFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Files of one draft grouped by field, each list ascending by file index.
pub type DraftFiles = BTreeMap<String, Vec<DraftFile>>;

/// Per-draft totals, as printed by `drafts --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSummary {
    pub draft_id: String,
    pub file_count: u64,
    pub total_bytes: u64,
}
