use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::KEY_SAVED_SEARCHES;
use crate::error::{SessionError, ValidationError};
use crate::store::PersistedStore;
use crate::types::SearchRequest;

/// 按名称保存的搜索
pub struct SavedSearches<'a, S: PersistedStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PersistedStore + ?Sized> SavedSearches<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn all(&self) -> BTreeMap<String, SearchRequest> {
        let Some(raw) = self.store.get(KEY_SAVED_SEARCHES) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("保存的搜索无法解析，已忽略: {}", e);
            BTreeMap::new()
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.all().into_keys().collect()
    }

    /// 同名时直接覆盖
    pub fn save(&self, name: &str, request: &SearchRequest) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptySearchName);
        }
        let mut all = self.all();
        if all.insert(name.to_string(), request.clone()).is_some() {
            info!("覆盖已保存的搜索: {}", name);
        }
        self.write(&all);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<SearchRequest, SessionError> {
        self.all()
            .remove(name.trim())
            .ok_or_else(|| SessionError::UnknownSavedSearch(name.to_string()))
    }

    pub fn delete(&self, name: &str) -> Result<(), SessionError> {
        let mut all = self.all();
        if all.remove(name.trim()).is_none() {
            return Err(SessionError::UnknownSavedSearch(name.to_string()));
        }
        self.write(&all);
        Ok(())
    }

    fn write(&self, all: &BTreeMap<String, SearchRequest>) {
        match serde_json::to_string(all) {
            Ok(raw) => self.store.set(KEY_SAVED_SEARCHES, &raw),
            Err(e) => warn!("保存的搜索序列化失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::SearchType;

    fn request(path: &str) -> SearchRequest {
        SearchRequest {
            search_path: path.into(),
            keywords: vec!["report".into(), "2024".into()],
            search_type: SearchType::FileContent,
            excluded_folders: vec!["node_modules".into()],
            file_extensions: vec![".docx".into()],
            include_dot_folders: true,
            case_sensitive: false,
            use_regex: true,
            file_category: "Documents".into(),
            min_size: Some(10),
            max_size: Some(5000),
        }
    }

    #[test]
    fn save_then_load_is_equal() {
        let store = MemoryStore::new();
        let saved = SavedSearches::new(&store);
        saved.save("reports", &request("/home/a")).unwrap();
        assert_eq!(saved.load("reports").unwrap(), request("/home/a"));
    }

    #[test]
    fn save_overwrites_existing_name() {
        let store = MemoryStore::new();
        let saved = SavedSearches::new(&store);
        saved.save("reports", &request("/home/a")).unwrap();
        saved.save("reports", &request("/home/b")).unwrap();

        assert_eq!(saved.names(), vec!["reports".to_string()]);
        assert_eq!(saved.load("reports").unwrap().search_path, "/home/b");
    }

    #[test]
    fn delete_requires_existing_name() {
        let store = MemoryStore::new();
        let saved = SavedSearches::new(&store);
        assert!(matches!(
            saved.delete("missing"),
            Err(SessionError::UnknownSavedSearch(_))
        ));

        saved.save("x", &request("/x")).unwrap();
        saved.delete("x").unwrap();
        assert!(saved.all().is_empty());
    }

    #[test]
    fn blank_name_is_rejected() {
        let store = MemoryStore::new();
        let saved = SavedSearches::new(&store);
        assert_eq!(
            saved.save("   ", &request("/x")),
            Err(ValidationError::EmptySearchName)
        );
        assert!(store.get(KEY_SAVED_SEARCHES).is_none());
    }
}
