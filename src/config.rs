use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// 历史记录最多保留条数
pub const HISTORY_LIMIT: usize = 15;

/// 默认 WebSocket 地址
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws";

/// 默认 HTTP 地址
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_LANGUAGE: &str = "en";

/// 持久化键名
pub const KEY_SAVED_SEARCHES: &str = "savedSearches";
pub const KEY_SEARCH_HISTORY: &str = "searchHistory";
pub const KEY_PREFERRED_LANGUAGE: &str = "preferredLanguage";

const DATA_DIR_NAME: &str = "PrecisionFileSearch";
const CONFIG_FILE_NAME: &str = "client.toml";
const STORE_FILE_NAME: &str = "store.json";

pub static DEFAULT_DATA_DIR: once_cell::sync::Lazy<PathBuf> = once_cell::sync::Lazy::new(|| {
    let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push(DATA_DIR_NAME);
    p
});

/// 客户端运行配置
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_base: String,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub notify_on_complete: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: DEFAULT_DATA_DIR.clone(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            notify_on_complete: true,
        }
    }
}

/// 配置文件中的字段全部可选，缺省时保留默认值
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    endpoint: Option<String>,
    api_base: Option<String>,
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    notify_on_complete: Option<bool>,
}

/// 命令行 / 环境变量覆盖项
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub api_base: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub quiet: bool,
}

impl ClientConfig {
    /// 默认值 → 配置文件 → 命令行
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let mut config = Self::default();

        let explicit = overrides.config_file.is_some();
        let file = match &overrides.config_file {
            Some(path) => path.clone(),
            None => overrides
                .data_dir
                .clone()
                .unwrap_or_else(|| config.data_dir.clone())
                .join(CONFIG_FILE_NAME),
        };
        if explicit || file.exists() {
            config.apply_file(&file)?;
        }

        if let Some(endpoint) = &overrides.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(api_base) = &overrides.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(data_dir) = &overrides.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(level) = &overrides.log_level {
            config.log_level = level.clone();
        }
        if overrides.quiet {
            config.notify_on_complete = false;
        }
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let file: FileConfig = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

        if let Some(v) = file.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = file.api_base {
            self.api_base = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.notify_on_complete {
            self.notify_on_complete = v;
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}
