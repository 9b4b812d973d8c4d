// Adapters layer: concrete storage engines and file sources behind the domain ports.

pub mod file_source;
pub mod memory;
pub mod sqlite;

pub use file_source::LocalFile;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
