//! User agent selection.
//!
//! Cloud hosts serve stripped-down or bot-gated pages to unknown agents, so
//! share-link and confirmation flows usually run with `impersonate`.

pub const USER_AGENT: &str = concat!("chartfetch/", env!("CARGO_PKG_VERSION"));

/// Desktop browser agents used in impersonate mode.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

fn pick_impersonated() -> &'static str {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    IMPERSONATE_USER_AGENTS[seed % IMPERSONATE_USER_AGENTS.len()]
}

/// Resolve the configured user agent.
/// - `None` or empty => chartfetch's own agent
/// - `"impersonate"` => one of [`IMPERSONATE_USER_AGENTS`]
/// - anything else => used verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some("impersonate") => pick_impersonated().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_agent_default() {
        assert!(resolve_user_agent(None).starts_with("chartfetch/"));
        assert!(resolve_user_agent(Some("  ")).starts_with("chartfetch/"));
    }

    #[test]
    fn test_resolve_user_agent_impersonate() {
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(IMPERSONATE_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_resolve_user_agent_custom() {
        assert_eq!(resolve_user_agent(Some("MyBot/1.0")), "MyBot/1.0");
    }
}
