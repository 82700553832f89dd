//! CLI-specific progress handling for nvdb-mapper
//!
//! Shows a progress bar over thematic query chunks.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use nvdb_mapper::ProgressCallback;

/// Creates a progress bar counting query chunks
pub fn create_progress_bar(total_chunks: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_chunks);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks ({percent}%) ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Progress manager for a mapping job
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: &str) -> Self {
        // Length is unknown until the first chunk completes
        let pb = create_progress_bar(0);
        eprintln!("{message}");
        Self { pb }
    }

    /// Callback to hand to `MappingOptions::progress`
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |done, total| {
            if pb.length().unwrap_or(0) != total {
                pb.set_length(total);
            }
            pb.set_position(done);
            if done >= total {
                pb.finish_with_message("Thematic lookup completed");
            }
        })
    }

    /// Clear the bar if the job ended before the last chunk
    pub fn finish(&self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}
