//! Classify and resolve single URLs.

use console::style;

use crate::config::Settings;
use crate::providers::{classify, ResolutionOutcome};

/// Print each URL's provider category.
pub fn cmd_classify(urls: &[String]) {
    for url in urls {
        let category = format!("{:<12}", classify(url).as_str());
        println!("{} {}", style(category).cyan(), url);
    }
}

/// Resolve a URL and print where it leads.
pub async fn cmd_resolve(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let client = settings.http_client()?;
    let registry = settings.resolver_registry(&client);

    let (category, outcome) = registry.resolve(url).await;
    println!("{} {} link", style("→").dim(), category);

    match outcome {
        ResolutionOutcome::Resolved(resolved) => {
            println!("{} {}", style("✓").green(), resolved);
        }
        ResolutionOutcome::ManualActionRequired {
            reason,
            original_url,
        } => {
            println!("{} {}: {}", style("!").yellow(), reason, original_url);
        }
        ResolutionOutcome::ResolutionFailed { kind, detail } => {
            println!("{} {}", style("✗").red(), kind);
            if !detail.is_empty() {
                println!("  {} {}", style("→").dim(), detail);
            }
        }
    }

    Ok(())
}
