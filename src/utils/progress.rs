use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Per-file progress over the grid cells being loaded.
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(total_cells: u64, file_name: &str, silent: bool) -> Self {
        if silent {
            return Self::silent();
        }

        let pb = ProgressBar::new(total_cells);
        let style = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message(format!("Loading {}", file_name));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress_bar: Some(pb),
        }
    }

    pub fn silent() -> Self {
        Self { progress_bar: None }
    }

    pub fn is_silent(&self) -> bool {
        self.progress_bar.is_none()
    }

    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.progress_bar {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_reporter_ignores_updates() {
        let progress = ProgressReporter::new(100, "file.nc", true);
        assert!(progress.is_silent());
        progress.increment(10);
        progress.finish_and_clear();
    }

    #[test]
    fn test_visible_reporter_counts_cells() {
        let progress = ProgressReporter::new(4, "file.nc", false);
        assert!(!progress.is_silent());
        progress.increment(3);
        if let Some(ref pb) = progress.progress_bar {
            assert_eq!(pb.position(), 3);
        }
        progress.finish_and_clear();
    }
}
