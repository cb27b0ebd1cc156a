//! Progress reporting

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress after every completed bunch
pub trait ProgressReporter: Send + Sync {
    /// `completed` of `total` bunches are done
    fn advance(&self, completed: usize, total: usize);

    /// The run finished successfully
    fn finish(&self);
}

/// Discards progress updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn advance(&self, _completed: usize, _total: usize) {}

    fn finish(&self) {}
}

/// Single-line terminal bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template("[{bar:50}] {percent}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for BarProgress {
    fn advance(&self, completed: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
