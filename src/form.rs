use crate::error::ValidationError;
use crate::types::{SearchRequest, SearchType};

/// 表单原始输入，列表字段是逗号分隔的文本
#[derive(Debug, Clone, Default)]
pub struct SearchForm {
    pub search_path: String,
    pub keywords: String,
    pub search_type: SearchType,
    pub excluded_folders: String,
    pub file_extensions: String,
    pub include_dot_folders: bool,
    pub case_sensitive: bool,
    pub use_regex: bool,
    pub file_category: String,
    pub min_size: i64,
    pub max_size: i64,
}

impl SearchForm {
    pub fn build(&self) -> Result<SearchRequest, ValidationError> {
        let search_path = self.search_path.trim();
        if search_path.is_empty() {
            return Err(ValidationError::MissingSearchPath);
        }

        Ok(SearchRequest {
            search_path: search_path.to_string(),
            keywords: split_list(&self.keywords),
            search_type: self.search_type,
            excluded_folders: split_list(&self.excluded_folders),
            file_extensions: split_list(&self.file_extensions),
            include_dot_folders: self.include_dot_folders,
            case_sensitive: self.case_sensitive,
            use_regex: self.use_regex,
            file_category: self.file_category.trim().to_string(),
            min_size: positive_size(self.min_size),
            max_size: positive_size(self.max_size),
        })
    }
}

/// 按逗号拆分，去掉首尾空白并丢弃空项，保持原顺序
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn positive_size(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|v| *v > 0)
}
