use chrono::{DateTime, Utc};
use std::time::Duration;

/// Records per second over `elapsed`, `None` for a zero-length interval.
pub fn throughput(records: u64, elapsed: Duration) -> Option<f64> {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        Some(records as f64 / seconds)
    } else {
        None
    }
}

pub fn format_throughput(records: u64, elapsed: Duration) -> String {
    match throughput(records, elapsed) {
        Some(rate) => format!("{:.1} records/s", rate),
        None => "n/a records/s".to_string(),
    }
}

/// Totals for one run, reported on the console at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub files_seen: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub records_inserted: u64,
    pub commits: u64,
    pub cap_reached: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn start() -> Self {
        Self {
            files_seen: 0,
            files_processed: 0,
            files_skipped: 0,
            records_inserted: 0,
            commits: 0,
            cap_reached: false,
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.elapsed = elapsed;
    }

    pub fn records_per_second(&self) -> Option<f64> {
        throughput(self.records_inserted, self.elapsed)
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Run summary:".to_string(),
            format!("  Files seen:       {}", self.files_seen),
            format!("  Files processed:  {}", self.files_processed),
            format!("  Files skipped:    {}", self.files_skipped),
            format!("  Records inserted: {}", self.records_inserted),
            format!("  Elapsed:          {:.3}s", self.elapsed.as_secs_f64()),
            format!(
                "  Mean throughput:  {}",
                format_throughput(self.records_inserted, self.elapsed)
            ),
        ];
        if self.commits > 0 {
            lines.push(format!("  Commits:          {}", self.commits));
        }
        if self.cap_reached {
            lines.push("  Stopped early: record cap reached".to_string());
        }
        lines.join("\n")
    }
}
