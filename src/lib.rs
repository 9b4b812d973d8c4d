pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{LocalFile, MemoryBackend, SqliteBackend};
pub use config::toml_config::StoreConfig;
pub use core::draft_store::DraftFileStore;
pub use domain::model::{DraftFile, DraftFileRecord, DraftFiles, DraftSummary, RecordKey};
pub use domain::ports::{DraftFileBackend, FileSource};
pub use utils::error::{DraftStoreError, Result};
