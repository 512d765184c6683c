use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

const USER_AGENT: &str = concat!("pfs-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenAction {
    OpenFile,
    OpenFolder,
}

#[derive(Debug, Serialize)]
struct OpenRequest<'a> {
    path: &'a str,
    action: OpenAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigStatus {
    pub status: String,
}

/// 后端的 HTTP 接口：保存/重置设置，打开文件或目录
#[derive(Debug, Clone)]
pub struct BackendApi {
    client: reqwest::Client,
    base: String,
}

impl BackendApi {
    pub fn new(base: &str) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub async fn save_config(&self, settings: &Value) -> Result<ConfigStatus, ApiError> {
        self.post_for_status("api/config", Some(settings)).await
    }

    pub async fn reset_config(&self) -> Result<ConfigStatus, ApiError> {
        self.post_for_status("api/config/reset", None).await
    }

    async fn post_for_status(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ConfigStatus, ApiError> {
        let mut request = self.client.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    pub async fn open(&self, path: &str, action: OpenAction) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("api/open"))
            .json(&OpenRequest { path, action })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// 不等待结果，失败只记日志
    pub fn open_detached(&self, path: &str, action: OpenAction) -> tokio::task::JoinHandle<()> {
        let api = self.clone();
        let path = path.to_string();
        tokio::spawn(async move {
            match api.open(&path, action).await {
                Ok(()) => debug!("已请求打开 {}", path),
                Err(e) => warn!("打开 {} 失败: {}", path, e),
            }
        })
    }
}
