//! Fetch progress display

use indicatif::{ProgressBar, ProgressStyle};

use crate::store::git::FetchProgressFn;

/// Progress bar fed by the content store's transfer callback
pub struct FetchProgress {
    bar: ProgressBar,
}

impl FetchProgress {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} objects")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// Callback for [`crate::store::GitStore::with_progress`]
    pub fn callback(&self) -> FetchProgressFn {
        let bar = self.bar.clone();
        Box::new(move |received, total| {
            bar.set_length(total as u64);
            bar.set_position(received as u64);
        })
    }

    /// Remove the bar; it is only useful while objects arrive
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
