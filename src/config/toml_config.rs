use crate::adapters::{MemoryBackend, SqliteBackend};
use crate::core::draft_store::DraftFileStore;
use crate::utils::error::{DraftStoreError, Result};
use crate::utils::validation::{self, Validate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BACKEND_SQLITE: &str = "sqlite";
pub const BACKEND_MEMORY: &str = "memory";
const BACKENDS: [&str; 2] = [BACKEND_SQLITE, BACKEND_MEMORY];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub store: StoreSection,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    pub path: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub max_file_bytes: Option<u64>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            busy_timeout_ms: None,
            max_file_bytes: None,
        }
    }
}

fn default_backend() -> String {
    BACKEND_SQLITE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl StoreConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DraftStoreError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DraftStoreError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HOME})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DraftStoreError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_one_of("store.backend", &self.store.backend, &BACKENDS)?;

        if let Some(path) = &self.store.path {
            validation::validate_path("store.path", path)?;
        }

        if let Some(timeout) = self.store.busy_timeout_ms {
            validation::validate_positive_number("store.busy_timeout_ms", timeout, 1)?;
        }

        if let Some(limit) = self.store.max_file_bytes {
            validation::validate_positive_number("store.max_file_bytes", limit, 1)?;
        }

        Ok(())
    }

    pub fn is_memory(&self) -> bool {
        self.store.backend == BACKEND_MEMORY
    }

    /// 資料庫路徑；未設定時使用系統資料目錄
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => SqliteBackend::default_path().ok_or_else(|| {
                DraftStoreError::MissingConfigError {
                    field: "store.path".to_string(),
                }
            }),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        self.store
            .busy_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(crate::adapters::sqlite::DEFAULT_BUSY_TIMEOUT)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    /// Build the store this configuration describes. Nothing is opened yet;
    /// the SQLite file is opened by the first operation.
    pub fn build_store(&self) -> Result<DraftFileStore> {
        let store = if self.is_memory() {
            DraftFileStore::new(MemoryBackend::new())
        } else {
            DraftFileStore::new(
                SqliteBackend::new(self.db_path()?).with_busy_timeout(self.busy_timeout()),
            )
        };
        Ok(store.with_max_file_bytes(self.store.max_file_bytes))
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
