//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};

/// HTTP response wrapper. Header names are lowercase.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    /// URL the response was served from (after any followed redirects).
    pub final_url: String,
    response: Response,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(
        status: StatusCode,
        headers: HashMap<String, String>,
        final_url: String,
        response: Response,
    ) -> Self {
        Self {
            status,
            headers,
            final_url,
            response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check for a 3xx status.
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// Raw `Location` header.
    pub fn location_header(&self) -> Option<&str> {
        self.headers.get("location").map(|s| s.as_str())
    }

    /// `Location` header resolved against the URL that produced this response.
    pub fn location(&self) -> Option<String> {
        let raw = self.location_header()?;
        match url::Url::parse(&self.final_url).and_then(|base| base.join(raw)) {
            Ok(joined) => Some(joined.to_string()),
            Err(_) => Some(raw.to_string()),
        }
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|s| s.parse().ok())
    }

    /// Whether the body is an HTML page (interstitials, share pages).
    pub fn is_html(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        })
    }

    /// 200 with a content type that is not a page.
    pub fn is_binary(&self) -> bool {
        self.status == StatusCode::OK && is_binary_content_type(self.content_type())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }

    /// Hand the underlying response to a streaming consumer.
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Archives arrive as zip/octet-stream, or with no type at all. Pages and
/// API error documents do not count.
pub fn is_binary_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return true;
    };
    let ct = ct.to_ascii_lowercase();
    !(ct.starts_with("text/")
        || ct.contains("html")
        || ct.contains("json")
        || ct.contains("xml"))
}
