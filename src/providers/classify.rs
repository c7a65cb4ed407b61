//! URL shape classification. Pure; never touches the network.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ProviderCategory;

static FOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/drive/(?:u/\d+/)?folders/|/folderview\?(?:[^#]*&)?id=")
        .expect("valid folder regex")
});

static FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/file/d/|/open\?(?:[^#]*&)?id=|/uc\?(?:[^#]*&)?id=").expect("valid file regex")
});

/// Hosts that only ever serve opaque share redirectors.
const SHARE_LINK_HOSTS: &[&str] = &["1drv.ms", "onedrive.live.com"];

/// Map a URL to its provider category.
///
/// Rules, first match wins:
/// 1. folder path segment => `CloudFolder`
/// 2. file path segment, `open?id=` or `uc?..id=` => `CloudFile`
/// 3. share-link host => `ShareLink`
/// 4. any other http(s) URL with a host => `DirectHttp`
/// 5. everything else => `Unknown`
pub fn classify(url: &str) -> ProviderCategory {
    let url = url.trim();

    if FOLDER_PATTERN.is_match(url) {
        return ProviderCategory::CloudFolder;
    }
    if FILE_PATTERN.is_match(url) {
        return ProviderCategory::CloudFile;
    }

    let Ok(parsed) = url::Url::parse(url) else {
        return ProviderCategory::Unknown;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return ProviderCategory::Unknown;
    }
    let Some(host) = parsed.host_str() else {
        return ProviderCategory::Unknown;
    };

    let host = host.to_ascii_lowercase();
    let is_share_host = SHARE_LINK_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)));
    if is_share_host {
        return ProviderCategory::ShareLink;
    }

    ProviderCategory::DirectHttp
}
