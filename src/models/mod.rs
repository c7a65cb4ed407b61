//! Data models for chartfetch.

mod chart;
mod provider;

pub use chart::ChartRecord;
pub use provider::ProviderCategory;
