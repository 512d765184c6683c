use tracing::warn;

use crate::config::{HISTORY_LIMIT, KEY_SEARCH_HISTORY};
use crate::error::SessionError;
use crate::store::PersistedStore;
use crate::types::SearchRequest;

/// 搜索历史：最新的在前，最多 HISTORY_LIMIT 条
pub struct SearchHistory<'a, S: PersistedStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PersistedStore + ?Sized> SearchHistory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<SearchRequest> {
        let Some(raw) = self.store.get(KEY_SEARCH_HISTORY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("历史记录无法解析，已忽略: {}", e);
            Vec::new()
        })
    }

    pub fn add(&self, request: &SearchRequest) {
        let mut entries = self.list();
        entries.insert(0, request.clone());
        entries.truncate(HISTORY_LIMIT);
        self.write(&entries);
    }

    pub fn get(&self, index: usize) -> Result<SearchRequest, SessionError> {
        self.list()
            .into_iter()
            .nth(index)
            .ok_or(SessionError::HistoryIndexOutOfRange(index))
    }

    /// 删除第 index 条，之后的条目依次上移
    pub fn remove(&self, index: usize) -> Result<SearchRequest, SessionError> {
        let mut entries = self.list();
        if index >= entries.len() {
            return Err(SessionError::HistoryIndexOutOfRange(index));
        }
        let removed = entries.remove(index);
        self.write(&entries);
        Ok(removed)
    }

    fn write(&self, entries: &[SearchRequest]) {
        match serde_json::to_string(entries) {
            Ok(raw) => self.store.set(KEY_SEARCH_HISTORY, &raw),
            Err(e) => warn!("历史记录序列化失败: {}", e),
        }
    }
}
