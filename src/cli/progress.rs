//! Multi-progress display for a download batch.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::services::download::DownloadEvent;

const SLOT_TEMPLATE: &str = "  {spinner:.cyan} {wide_msg} [{bar:25.cyan/blue}] {bytes}/{total_bytes}";
const SPINNER_TEMPLATE: &str = "  {spinner:.cyan} {wide_msg} {bytes}";
const IDLE_TEMPLATE: &str = "  {spinner:.dim} {wide_msg}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
}

/// A summary bar plus one bar per concurrency slot.
///
/// Items are mapped to slots by `index % slots`; since a group never holds
/// more than `slots` items, two items in flight never share a bar.
pub struct BatchProgress {
    multi: MultiProgress,
    slots: Vec<ProgressBar>,
    summary_bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(slots: usize, total: u64) -> Self {
        let multi = MultiProgress::new();

        let summary_bar = multi.add(ProgressBar::new(total));
        summary_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        summary_bar.set_message("Downloading");

        let slots = (0..slots.max(1))
            .map(|_| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(style(IDLE_TEMPLATE));
                bar.set_message("idle");
                bar
            })
            .collect();

        Self {
            multi,
            slots,
            summary_bar,
        }
    }

    fn slot(&self, index: usize) -> &ProgressBar {
        &self.slots[index % self.slots.len()]
    }

    pub fn start(&self, index: usize, filename: &str) {
        let bar = self.slot(index);
        bar.set_style(style(SPINNER_TEMPLATE));
        bar.set_length(0);
        bar.set_position(0);
        bar.set_message(truncate_filename(filename, 35));
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
    }

    pub fn update(&self, index: usize, downloaded: u64, total: Option<u64>) {
        let bar = self.slot(index);
        if let Some(total) = total {
            if bar.length() != Some(total) {
                bar.set_style(style(SLOT_TEMPLATE));
                bar.set_length(total);
            }
        }
        bar.set_position(downloaded);
    }

    /// Free the item's slot and advance the summary.
    pub fn finish_item(&self, index: usize) {
        let bar = self.slot(index);
        bar.disable_steady_tick();
        bar.set_style(style(IDLE_TEMPLATE));
        bar.set_message("idle");
        bar.set_length(0);
        bar.set_position(0);
        self.summary_bar.inc(1);
    }

    pub fn set_summary(&self, tally: &LiveTally) {
        self.summary_bar.set_message(tally.to_string());
    }

    /// Print above the bars without corrupting them.
    pub fn println(&self, message: &str) {
        let _ = self.multi.println(message);
    }

    pub fn finish(&self) {
        for bar in &self.slots {
            bar.finish_and_clear();
        }
        self.summary_bar.finish_and_clear();
    }
}

/// Running outcome counts while a batch is in flight.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiveTally {
    pub downloaded: usize,
    pub skipped: usize,
    pub manual: usize,
    pub failed: usize,
}

impl LiveTally {
    /// Count a terminal event; progress events are ignored.
    pub fn record(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Completed { .. } => self.downloaded += 1,
            DownloadEvent::Skipped { .. } => self.skipped += 1,
            DownloadEvent::ManualAction { .. } => self.manual += 1,
            DownloadEvent::Failed { .. } => self.failed += 1,
            DownloadEvent::Started { .. } | DownloadEvent::Progress { .. } => {}
        }
    }
}

impl std::fmt::Display for LiveTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Downloaded: {} | Skipped: {} | Manual: {} | Failed: {}",
            self.downloaded, self.skipped, self.manual, self.failed
        )
    }
}

/// Truncate a filename for display, keeping the extension visible.
fn truncate_filename(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    if let Some(dot_pos) = chars.iter().rposition(|c| *c == '.') {
        let ext: String = chars[dot_pos..].iter().collect();
        let ext_len = chars.len() - dot_pos;
        if ext_len + 4 < max_len {
            let prefix: String = chars[..max_len - ext_len - 3].iter().collect();
            return format!("{}...{}", prefix, ext);
        }
    }

    let prefix: String = chars[..max_len.saturating_sub(3)].iter().collect();
    format!("{}...", prefix)
}
