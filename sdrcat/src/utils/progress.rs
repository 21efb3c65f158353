// SPDX-License-Identifier: MIT

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress for a file of known size; hidden when `visible` is false.
pub fn byte_progress(total: u64, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.white}] {bytes}/{total_bytes} {msg}")
        .map(|s| s.progress_chars("█░░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
