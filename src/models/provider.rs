//! Provider categories.

use serde::{Deserialize, Serialize};

/// Closed set of link shapes the pipeline knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    /// Plain http(s) resource fetched as-is.
    DirectHttp,
    /// Single cloud-storage file behind the confirmation flow.
    CloudFile,
    /// Cloud-storage folder; always needs a human.
    CloudFolder,
    /// Short share link that must be transformed into an API URL.
    ShareLink,
    Unknown,
}

impl ProviderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectHttp => "direct_http",
            Self::CloudFile => "cloud_file",
            Self::CloudFolder => "cloud_folder",
            Self::ShareLink => "share_link",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
