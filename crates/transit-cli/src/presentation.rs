//! Terminal output: the fetch progress bar and the status table.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

use transit_core::transfer::TransferSummary;
use transit_transfers::EngineStatus;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {prefix}";

/// Progress bar for a single fetch; silent when `quiet`.
pub struct FetchProgress {
    bar: Option<ProgressBar>,
    name: String,
}

impl FetchProgress {
    pub fn new(name: &str, quiet: bool) -> Result<Self> {
        let bar = if quiet {
            None
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(ProgressStyle::with_template(BAR_TEMPLATE)?.progress_chars("█▓░"));
            bar.set_message(format!("{name} (waiting)"));
            Some(bar)
        };
        Ok(Self {
            bar,
            name: name.to_string(),
        })
    }

    pub fn update(&self, summary: &TransferSummary) {
        let Some(bar) = &self.bar else {
            return;
        };
        if summary.size > 0 {
            bar.set_length(summary.size);
        }
        bar.set_position(summary.bytes_received);
        bar.set_message(format!("{} ({})", self.name, summary.state));
        bar.set_prefix(format!("{}/s", HumanBytes(summary.download_speed)));
        bar.tick();
    }

    pub fn finish(&self, path: &Path) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!("{} saved to {}", self.name, path.display()));
        }
    }

    pub fn abandon(&self, reason: &str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(format!("{} {reason}", self.name));
        }
    }
}

/// One status-table row.
pub fn summary_line(summary: &TransferSummary) -> String {
    let size = if summary.size == 0 {
        "?".to_string()
    } else {
        HumanBytes(summary.size).to_string()
    };
    format!(
        "{:<13} {:<20} {:>3}%  {:>10}  {}",
        summary.kind.as_str(),
        summary.state.as_str(),
        summary.progress,
        size,
        summary.display_name
    )
}

/// Human-readable engine status followed by every transfer.
pub fn render_status(status: &EngineStatus, summaries: &[TransferSummary]) -> String {
    let mut out = String::new();
    let engine = if status.started { "running" } else { "not running" };
    let _ = writeln!(out, "BitTorrent engine: {engine}");
    let _ = writeln!(
        out,
        "Bandwidth: {}/s down, {}/s up",
        HumanBytes(status.downloads_bandwidth),
        HumanBytes(status.uploads_bandwidth)
    );
    let _ = writeln!(
        out,
        "Active: {} downloading, {} uploading, {} to review",
        status.active_downloads, status.active_uploads, status.downloads_to_review
    );
    if summaries.is_empty() {
        out.push_str("No transfers\n");
    }
    for summary in summaries {
        out.push_str(&summary_line(summary));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use transit_core::transfer::{Eta, TransferId, TransferKind, TransferState};

    fn summary(name: &str, size: u64, progress: u8) -> TransferSummary {
        TransferSummary {
            id: TransferId::from_url(format!("http://host/{name}")),
            kind: TransferKind::Http,
            display_name: name.to_string(),
            state: TransferState::Downloading,
            size,
            bytes_received: 0,
            bytes_sent: 0,
            download_speed: 0,
            upload_speed: 0,
            progress,
            eta: Eta::Infinite,
            complete: false,
            created: Default::default(),
            save_path: PathBuf::from("/tmp").join(name),
        }
    }

    #[test]
    fn summary_line_columns() {
        let line = summary_line(&summary("song.mp3", 2_048, 50));
        assert!(line.starts_with("http"));
        assert!(line.contains("downloading"));
        assert!(line.contains(" 50%"));
        assert!(line.contains("2.00 KiB"));
        assert!(line.ends_with("song.mp3"));
    }

    #[test]
    fn unknown_size_is_a_question_mark() {
        assert!(summary_line(&summary("stream", 0, 0)).contains("  ?  "));
    }

    #[test]
    fn empty_status() {
        let status = EngineStatus {
            started: false,
            firewalled: false,
            downloads_bandwidth: 0,
            uploads_bandwidth: 0,
            active_downloads: 0,
            active_uploads: 0,
            downloads_to_review: 0,
        };
        let text = render_status(&status, &[]);
        assert!(text.contains("not running"));
        assert!(text.ends_with("No transfers\n"));
    }

    #[test]
    fn quiet_progress_draws_nothing() {
        let progress = FetchProgress::new("x", true).unwrap();
        progress.update(&summary("x", 10, 10));
        progress.finish(Path::new("/tmp/x"));
    }
}
