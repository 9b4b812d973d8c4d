pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "draft-store")]
#[command(about = "Inspect and manage staged draft files")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Database file, overrides store.path
    #[arg(long, conflicts_with = "memory")]
    pub db: Option<PathBuf>,

    /// Keep files in memory only (nothing survives the process)
    #[arg(long)]
    pub memory: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Save files to a draft field. Without --index the field's files are replaced.
    Put {
        draft_id: String,
        field_name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Save a single file at this index, leaving the rest of the field alone
        #[arg(long)]
        index: Option<u32>,
        /// Override the detected MIME type
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List a draft's files by field
    Ls {
        draft_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Write a draft's files to DIR/<field>/<position>-<name>
    Export { draft_id: String, dir: PathBuf },
    /// Delete a field's files, or the whole draft's files
    Rm {
        draft_id: String,
        #[arg(long)]
        field: Option<String>,
    },
    /// Exit 0 if the draft has files, 1 if it has none, 2 or higher on errors
    Has { draft_id: String },
    /// List drafts with file counts and sizes
    Drafts {
        #[arg(long)]
        json: bool,
    },
    /// Delete every stored file
    Wipe {
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Layer command line overrides on top of the file configuration.
    pub fn apply_overrides(&self, config: &mut toml_config::StoreConfig) {
        if self.memory {
            config.store.backend = toml_config::BACKEND_MEMORY.to_string();
        }
        if let Some(db) = &self.db {
            config.store.backend = toml_config::BACKEND_SQLITE.to_string();
            config.store.path = Some(db.to_string_lossy().into_owned());
        }
    }
}
