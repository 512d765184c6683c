use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::SessionError;
use crate::preferences::Preferences;
use crate::store::PersistedStore;
use crate::transport::{fetch_remote_config, Transport};

/// 启动时从后端拿到的内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Startup {
    pub file_categories: Vec<String>,
    pub defaults: Map<String, Value>,
    /// 本次新写入本地的偏好字段
    pub seeded: Vec<String>,
}

/// 拉取远程配置，并用其中的数值默认值补齐本地偏好
pub async fn load_remote_config<T, S>(
    transport: &T,
    endpoint: &str,
    store: &S,
) -> Result<Startup, SessionError>
where
    T: Transport,
    S: PersistedStore + ?Sized,
{
    let remote = fetch_remote_config(transport, endpoint).await?;
    let seeded = Preferences::new(store).seed_from_defaults(&remote.defaults);
    info!(
        "已获取远程配置：{} 个文件分类，新写入 {} 个偏好",
        remote.file_categories.len(),
        seeded.len()
    );
    Ok(Startup {
        file_categories: remote.file_categories,
        defaults: remote.defaults,
        seeded,
    })
}

/// 同上，失败时只记日志并返回空结果
pub async fn load_remote_config_or_default<T, S>(transport: &T, endpoint: &str, store: &S) -> Startup
where
    T: Transport,
    S: PersistedStore + ?Sized,
{
    match load_remote_config(transport, endpoint, store).await {
        Ok(startup) => startup,
        Err(e) => {
            warn!("获取远程配置失败: {}", e);
            Startup::default()
        }
    }
}
