use chrono::{DateTime, Local};
use serde::Serialize;
use url::Url;

use crate::error::SessionError;
use crate::types::CompletedScan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(format!("不支持的导出格式: {other}")),
        }
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    summary: &'a str,
    generated_at: String,
    results: &'a [String],
}

pub fn render(
    scan: &CompletedScan,
    format: ExportFormat,
    generated_at: DateTime<Local>,
) -> Result<String, SessionError> {
    let stamp = generated_at.format("%Y-%m-%d %H:%M:%S").to_string();
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&JsonExport {
            summary: &scan.summary,
            generated_at: stamp,
            results: &scan.results,
        })?),
        ExportFormat::Html => Ok(render_html(scan, &stamp)),
    }
}

fn render_html(scan: &CompletedScan, stamp: &str) -> String {
    let mut items = String::with_capacity(scan.results.len() * 96);
    for path in &scan.results {
        let escaped = escape_html(path);
        items.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            escape_html(&file_url(path)),
            escaped
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
<html>\n\
  <head>\n\
    <meta charset=\"utf-8\">\n\
    <title>Search Results</title>\n\
  </head>\n\
  <body>\n\
    <h1>Search Results</h1>\n\
    <p>Generated {stamp}</p>\n\
    <p>{summary}</p>\n\
    <ol>\n{items}    </ol>\n\
  </body>\n\
</html>\n",
        stamp = escape_html(stamp),
        summary = escape_html(&scan.summary),
        items = items,
    )
}

/// 每个路径段单独做百分号编码，`#`、`?`、`%` 和空格都不会破坏链接
fn file_url(path: &str) -> String {
    if let Ok(url) = Url::from_file_path(path) {
        return url.to_string();
    }

    // 非本机格式的路径（例如在 Unix 上看到的 Windows 盘符路径）
    let normalized = path.replace('\\', "/");
    let Ok(mut url) = Url::parse("file:///") else {
        return format!("file:///{}", normalized.trim_start_matches('/'));
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .clear()
            .extend(normalized.split('/').filter(|s| !s.is_empty()));
    }
    url.to_string()
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
