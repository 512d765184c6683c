use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{DEFAULT_LANGUAGE, KEY_PREFERRED_LANGUAGE};
use crate::store::PersistedStore;

/// 数值偏好（每个字段单独一个键）和界面语言
pub struct Preferences<'a, S: PersistedStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PersistedStore + ?Sized> Preferences<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn number(&self, field: &str) -> Option<i64> {
        self.store.get(field)?.trim().parse().ok()
    }

    pub fn set_number(&self, field: &str, value: i64) {
        self.store.set(field, &value.to_string());
    }

    pub fn language(&self) -> String {
        self.store
            .get(KEY_PREFERRED_LANGUAGE)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    pub fn set_language(&self, code: &str) {
        self.store.set(KEY_PREFERRED_LANGUAGE, code.trim());
    }

    /// 用远程默认值填充尚未保存的数值字段，已有的值不覆盖。返回写入的字段名。
    pub fn seed_from_defaults(&self, defaults: &Map<String, Value>) -> Vec<String> {
        let mut seeded = Vec::new();
        for (field, value) in defaults {
            let Some(n) = value.as_i64() else {
                continue;
            };
            if self.store.get(field).is_some() {
                continue;
            }
            self.set_number(field, n);
            seeded.push(field.clone());
        }
        debug!("已用远程默认值填充 {} 个偏好字段", seeded.len());
        seeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn seeding_never_overwrites() {
        let store = MemoryStore::new();
        let prefs = Preferences::new(&store);
        prefs.set_number("max_results", 10);

        let defaults = json!({
            "max_results": 50,
            "context_window": 3,
            "excluded_folders": ["node_modules"],
        });
        let seeded = prefs.seed_from_defaults(defaults.as_object().unwrap());

        assert_eq!(seeded, vec!["context_window".to_string()]);
        assert_eq!(prefs.number("max_results"), Some(10));
        assert_eq!(prefs.number("context_window"), Some(3));
        assert_eq!(store.get("excluded_folders"), None);
    }

    #[test]
    fn language_defaults_to_english() {
        let store = MemoryStore::new();
        let prefs = Preferences::new(&store);
        assert_eq!(prefs.language(), "en");
        prefs.set_language(" fa ");
        assert_eq!(prefs.language(), "fa");
    }

    #[test]
    fn non_numeric_value_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("max_results", "lots");
        assert_eq!(Preferences::new(&store).number("max_results"), None);
    }
}
