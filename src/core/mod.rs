pub mod draft_store;

pub use crate::domain::model::{DraftFile, DraftFileRecord, DraftFiles, DraftSummary, RecordKey};
pub use crate::domain::ports::{DraftFileBackend, FileSource};
pub use crate::utils::error::Result;
