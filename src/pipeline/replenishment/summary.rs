//! End-of-run report.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{ConclusionCounts, DecisionMethod, ProcessingResult};

#[derive(Debug, Clone, Serialize)]
pub struct FailedFamily {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    /// Families discovered (after the optional filter).
    pub total_families: usize,
    /// Families skipped because an earlier run already processed them.
    pub skipped: usize,
    pub results: Vec<ProcessingResult>,
    pub failed: Vec<FailedFamily>,
    pub documents_written: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            dry_run,
            total_families: 0,
            skipped: 0,
            results: Vec::new(),
            failed: Vec::new(),
            documents_written: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn conclusion_counts(&self) -> ConclusionCounts {
        let mut counts = ConclusionCounts::default();
        for r in self.results.iter().filter(|r| r.success) {
            counts.merge(&r.conclusion_counts());
        }
        counts
    }

    /// Successful families per method: `(rule, ai)`.
    pub fn method_split(&self) -> (usize, usize) {
        self.results
            .iter()
            .filter(|r| r.success)
            .fold((0, 0), |(rule, ai), r| match r.method {
                DecisionMethod::Rule => (rule + 1, ai),
                DecisionMethod::Ai => (rule, ai + 1),
            })
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.conclusion_counts();
        let (rule, ai) = self.method_split();

        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "Run {}{mode}", self.run_id)?;
        writeln!(f, "  Families:   {} total, {} skipped", self.total_families, self.skipped)?;
        writeln!(f, "  Succeeded:  {}", self.succeeded())?;
        writeln!(f, "  Failed:     {}", self.failed.len())?;
        writeln!(f, "  Materials:  YES {} / NO {} / SLIT {}", counts.yes, counts.no, counts.slit)?;
        writeln!(f, "  Method:     {rule} rule-based, {ai} AI")?;
        if !self.dry_run {
            writeln!(f, "  Documents:  {} written", self.documents_written)?;
        }
        write!(f, "  Duration:   {}", format_duration(self.duration))?;
        for failure in &self.failed {
            write!(f, "\n    - {}: {}", failure.key, failure.error)?;
        }
        Ok(())
    }
}

/// `1h 2m`, `3m 4s` or `5s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
