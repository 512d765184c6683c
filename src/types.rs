use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 搜索类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    FileContent,
    FileName,
    FolderName,
    FileCategory,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileContent => "file_content",
            Self::FileName => "file_name",
            Self::FolderName => "folder_name",
            Self::FileCategory => "file_category",
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file_content" | "content" => Ok(Self::FileContent),
            "file_name" | "name" => Ok(Self::FileName),
            "folder_name" | "folder" => Ok(Self::FolderName),
            "file_category" | "category" => Ok(Self::FileCategory),
            other => Err(format!("未知的搜索类型: {other}")),
        }
    }
}

/// 一次搜索的全部参数，构建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_path: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub include_dot_folders: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub use_regex: bool,
    #[serde(default)]
    pub file_category: String,
    #[serde(default)]
    pub min_size: Option<u64>,
    #[serde(default)]
    pub max_size: Option<u64>,
}

impl SearchRequest {
    /// 用于历史列表和日志的一行描述
    pub fn label(&self) -> String {
        if self.keywords.is_empty() {
            format!("[{}] {}", self.search_type.as_str(), self.search_path)
        } else {
            format!(
                "[{}] {} :: {}",
                self.search_type.as_str(),
                self.search_path,
                self.keywords.join(", ")
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scanned: u64,
    pub found: u64,
}

/// 服务端 → 客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Config {
        #[serde(default)]
        file_categories: Vec<String>,
        #[serde(default)]
        defaults: Map<String, Value>,
    },
    Error {
        message: String,
    },
    ScanStart {
        #[serde(default, deserialize_with = "task_id_as_text")]
        task_id: Option<String>,
    },
    ItemFound {
        path: String,
    },
    ScanProgress {
        progress: ScanProgress,
    },
    ScanComplete {
        #[serde(default)]
        results: Vec<String>,
        #[serde(default)]
        summary: String,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Error { .. } => "error",
            Self::ScanStart { .. } => "scan_start",
            Self::ItemFound { .. } => "item_found",
            Self::ScanProgress { .. } => "scan_progress",
            Self::ScanComplete { .. } => "scan_complete",
        }
    }
}

// 后端的 task_id 可能是字符串也可能是数字
fn task_id_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// 客户端 → 服务端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartSearch { payload: SearchRequest },
}

/// 启动时从后端拿到的远程配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteConfig {
    pub file_categories: Vec<String>,
    pub defaults: Map<String, Value>,
}

/// 扫描完成时捕获的结果集
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedScan {
    pub results: Vec<String>,
    pub summary: String,
}
