//! HTTP client used by resolvers and the byte fetcher.
//!
//! Wraps two reqwest clients sharing the same user agent and timeout: one
//! follows redirects, the other never does so callers can inspect each hop
//! (share-link chains, confirmation redirects, fetcher redirect limits).

mod response;
mod user_agent;

pub use response::{is_binary_content_type, HttpResponse};
pub use user_agent::{resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::{Duration, Instant};

use reqwest::{redirect, Client};
use tracing::debug;

/// Redirect hops the following client accepts before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// HTTP client with a redirect-following and a manual-redirect variant.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    no_redirect: Client,
}

fn extract_response_headers(response: &reqwest::Response) -> std::collections::HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Builder for constructing `HttpClient` with optional configuration.
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    /// Set the user agent string.
    /// - `"impersonate"`: Use random real browser user agent
    /// - Any other string: Use as-is
    /// - Not called: Use default chartfetch user agent
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    /// Build the `HttpClient`.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = resolve_user_agent(self.user_agent.as_deref());

        let client = Client::builder()
            .user_agent(&user_agent)
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let no_redirect = Client::builder()
            .user_agent(&user_agent)
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(redirect::Policy::none())
            .build()?;

        debug!(
            "HTTP client ready (timeout {:?}, user agent {})",
            self.timeout, user_agent
        );

        Ok(HttpClient {
            client,
            no_redirect,
        })
    }
}

impl HttpClient {
    /// Create a builder. `timeout` bounds connecting and each read, not the
    /// whole body, so long archive downloads are limited only by the caller.
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            user_agent: None,
        }
    }

    /// GET, following redirects.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        self.send(&self.client, url).await
    }

    /// GET without following redirects; 3xx responses are returned as-is.
    pub async fn get_manual(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        self.send(&self.no_redirect, url).await
    }

    async fn send(&self, client: &Client, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = client.get(url).send().await?;
        let status = response.status();
        let headers = extract_response_headers(&response);
        let final_url = response.url().to_string();

        debug!(
            "GET {} -> {} in {}ms",
            url,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        Ok(HttpResponse::from_reqwest(status, headers, final_url, response))
    }
}
