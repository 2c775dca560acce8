//! Terminal progress reporting for scans.

use std::sync::OnceLock;

use indicatif::ProgressBar;
use surch_core::{Repository, ScanPhase, ScanProgress};

use crate::ui::{self, create_commit_progress};

/// Prints phase changes and drives a commit progress bar.
///
/// The bar is skipped entirely when `show_bar` is false, e.g. in verbose
/// mode where log lines would tear it.
#[derive(Debug)]
pub struct CliProgress {
    show_bar: bool,
    bar: OnceLock<ProgressBar>,
}

impl CliProgress {
    pub fn new(show_bar: bool) -> Self {
        Self {
            show_bar,
            bar: OnceLock::new(),
        }
    }

    fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}

impl ScanProgress for CliProgress {
    fn phase(&self, phase: ScanPhase, repo: &Repository) {
        match phase {
            ScanPhase::Acquiring => ui::print_info(&format!("syncing {repo}")),
            ScanPhase::Assembling | ScanPhase::Done => self.finish(),
            _ => {}
        }
    }

    fn commits_found(&self, total: usize) {
        if self.show_bar && total > 0 {
            let _ = self.bar.set(create_commit_progress(total));
        }
    }

    fn commit_scanned(&self) {
        if let Some(bar) = self.bar.get() {
            bar.inc(1);
        }
    }
}
