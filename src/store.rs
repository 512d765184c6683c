//! 本地键值持久化。
//!
//! 读失败按"不存在"处理，写失败只记录日志，不向调用方报告。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

pub trait PersistedStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

impl<S: PersistedStore + ?Sized> PersistedStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// 整个存储是数据目录下的一个 JSON 对象文件，每次修改都整体重写
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("存储文件已损坏，按空存储打开 {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("读取存储文件失败 {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        debug!("已打开存储 {} ({} 个键)", path.display(), entries.len());

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("无法创建数据目录 {}: {}", parent.display(), e);
                return;
            }
        }
        let data = match serde_json::to_string_pretty(entries) {
            Ok(d) => d,
            Err(e) => {
                warn!("序列化存储失败: {}", e);
                return;
            }
        };
        // 先写同目录的临时文件，再改名覆盖
        let tmp = self.tmp_path();
        if let Err(e) = std::fs::write(&tmp, data) {
            warn!("写入存储失败 {}: {}", tmp.display(), e);
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!("替换存储文件失败 {}: {}", self.path.display(), e);
            let _ = std::fs::remove_file(&tmp);
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PersistedStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
            self.flush(&entries);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.remove(key).is_some() {
                self.flush(&entries);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path);
        store.set("preferredLanguage", "fa");
        store.set("max_results", "50");
        store.remove("max_results");
        drop(store);

        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get("preferredLanguage").as_deref(), Some("fa"));
        assert_eq!(reopened.get("max_results"), None);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get("anything"), None);
        store.set("k", "v");
        assert_eq!(JsonFileStore::open(&path).get("k").as_deref(), Some("v"));
    }

    #[test]
    fn interrupted_write_leaves_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path);
        store.set("savedSearches", "{}");

        // 上次进程在写临时文件时退出
        let tmp = dir.path().join("store.json.tmp");
        std::fs::write(&tmp, "{ \"savedSearches\": ").unwrap();
        let reopened = JsonFileStore::open(&path);
        assert_eq!(reopened.get("savedSearches").as_deref(), Some("{}"));

        reopened.set("preferredLanguage", "en");
        assert!(!tmp.exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn memory_store_basics() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", "1");
        store.set("a", "2");
        assert_eq!(store.get("a").as_deref(), Some("2"));
        store.remove("a");
        assert_eq!(store.get("a"), None);
    }
}
