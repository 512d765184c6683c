use thiserror::Error;

/// 传输层错误：连接失败、中途断开、帧无法解析
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("无法连接到 {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("连接已断开: {0}")]
    Dropped(String),
    #[error("连接在扫描完成前被关闭")]
    ClosedEarly,
    #[error("发送失败: {0}")]
    Send(String),
    #[error("无法解析消息: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("搜索路径不能为空")]
    MissingSearchPath,
    #[error("保存的搜索名称不能为空")]
    EmptySearchName,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("后端报告错误: {0}")]
    Server(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("没有可导出的结果")]
    NothingToExport,
    #[error("找不到保存的搜索: {0}")]
    UnknownSavedSearch(String),
    #[error("历史记录索引越界: {0}")]
    HistoryIndexOutOfRange(usize),
    #[error("导出序列化失败: {0}")]
    Export(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("后端返回状态 {status}: {body}")]
    Status { status: u16, body: String },
}
