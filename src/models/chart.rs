//! Chart records supplied by the scraper/catalog.

use serde::{Deserialize, Serialize};

/// A chart as discovered by the scraper. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Tempo descriptor as scraped (e.g. "180", "90-180").
    #[serde(default, alias = "bpm")]
    pub tempo: String,
    #[serde(default)]
    pub difficulties: Vec<String>,
    /// Third-party hosting link. `None` means no provider was ever found.
    #[serde(default, alias = "download_url")]
    pub download_url: Option<String>,
    /// Page the chart was scraped from. Never empty.
    #[serde(alias = "source_page_url", alias = "sourceUrl")]
    pub source_page_url: String,
    /// Scraper/source name, used for optional per-source subdirectories.
    #[serde(default)]
    pub source: Option<String>,
}

impl ChartRecord {
    /// Create a record with the fields the pipeline needs.
    pub fn new(id: &str, title: &str, artist: &str, source_page_url: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            tempo: String::new(),
            difficulties: Vec::new(),
            download_url: None,
            source_page_url: source_page_url.to_string(),
            source: None,
        }
    }

    /// Set the download link.
    pub fn with_download_url(mut self, url: &str) -> Self {
        self.download_url = Some(url.to_string());
        self
    }

    /// Set the source name.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Download link, treating an empty string the same as a missing one.
    pub fn download_link(&self) -> Option<&str> {
        self.download_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Short label for logs and progress output.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }

    /// Name of the source subdirectory: explicit source, else the source page host.
    pub fn source_name(&self) -> Option<String> {
        if let Some(source) = self.source.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(source.trim().to_string());
        }
        url::Url::parse(&self.source_page_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_download_url_is_missing() {
        let record = ChartRecord::new("1", "Foo", "Bar", "https://example.com/chart/1")
            .with_download_url("   ");
        assert_eq!(record.download_link(), None);
    }

    #[test]
    fn test_source_name_falls_back_to_page_host() {
        let record = ChartRecord::new("1", "Foo", "Bar", "https://charts.example.org/s/1");
        assert_eq!(record.source_name().as_deref(), Some("charts.example.org"));

        let record = record.with_source("enchor");
        assert_eq!(record.source_name().as_deref(), Some("enchor"));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "id": "42",
            "title": "Foo",
            "artist": "Bar",
            "bpm": "170",
            "difficulties": ["expert"],
            "downloadUrl": "https://host/drive/folders/abc",
            "sourcePageUrl": "https://example.com/42"
        }"#;
        let record: ChartRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.tempo, "170");
        assert_eq!(record.download_link(), Some("https://host/drive/folders/abc"));
        assert_eq!(record.source, None);
    }
}
