//! Copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

/// Aggregate counters and diagnostics for one top-level copy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReportGraphCopy {
    /// Number of capability-typed entities copied.
    pub cnt_copied: u64,
    /// Number of non-capability entities passed through by reference.
    pub cnt_shared: u64,
    /// Number of references redirected to the copy of their parent.
    pub cnt_redirected: u64,
    /// Number of excluded fields skipped.
    pub cnt_excluded: u64,
    /// Number of entities reused from the memo table.
    pub cnt_memoized: u64,
    /// Non-fatal warnings collected during the copy.
    pub warnings: Vec<String>,
}

impl ReportGraphCopy {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_shared".to_string(), self.cnt_shared);
        dict_counts.insert("cnt_redirected".to_string(), self.cnt_redirected);
        dict_counts.insert("cnt_excluded".to_string(), self.cnt_excluded);
        dict_counts.insert("cnt_memoized".to_string(), self.cnt_memoized);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} copied={} shared={} redirected={} excluded={} memoized={} warnings={}",
            dict_counts["cnt_copied"],
            dict_counts["cnt_shared"],
            dict_counts["cnt_redirected"],
            dict_counts["cnt_excluded"],
            dict_counts["cnt_memoized"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportGraphCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[COPY]"))
    }
}

/// Mutable accumulator for copy statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportGraphCopyBuilder {
    /// See [`ReportGraphCopy::cnt_copied`].
    pub cnt_copied: u64,
    /// See [`ReportGraphCopy::cnt_shared`].
    pub cnt_shared: u64,
    /// See [`ReportGraphCopy::cnt_redirected`].
    pub cnt_redirected: u64,
    /// See [`ReportGraphCopy::cnt_excluded`].
    pub cnt_excluded: u64,
    /// See [`ReportGraphCopy::cnt_memoized`].
    pub cnt_memoized: u64,
    /// See [`ReportGraphCopy::warnings`].
    pub warnings: Vec<String>,
}

impl ReportGraphCopyBuilder {
    pub fn add_copied(&mut self) {
        self.cnt_copied += 1;
    }

    pub fn add_shared(&mut self) {
        self.cnt_shared += 1;
    }

    pub fn add_redirected(&mut self) {
        self.cnt_redirected += 1;
    }

    pub fn add_excluded(&mut self, value: u64) {
        self.cnt_excluded += value;
    }

    pub fn add_memoized(&mut self) {
        self.cnt_memoized += 1;
    }

    /// Add warning message once; repeated identical warnings are dropped.
    pub fn add_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Fold a finished report (e.g. one batch item) into this builder.
    pub fn merge(&mut self, report: ReportGraphCopy) {
        self.cnt_copied += report.cnt_copied;
        self.cnt_shared += report.cnt_shared;
        self.cnt_redirected += report.cnt_redirected;
        self.cnt_excluded += report.cnt_excluded;
        self.cnt_memoized += report.cnt_memoized;
        for warning in report.warnings {
            self.add_warning(warning);
        }
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportGraphCopy {
        ReportGraphCopy {
            cnt_copied: self.cnt_copied,
            cnt_shared: self.cnt_shared,
            cnt_redirected: self.cnt_redirected,
            cnt_excluded: self.cnt_excluded,
            cnt_memoized: self.cnt_memoized,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReportGraphCopy, ReportGraphCopyBuilder};

    #[test]
    fn report_to_dict_and_format() {
        let report = ReportGraphCopy {
            cnt_copied: 3,
            cnt_shared: 1,
            cnt_redirected: 2,
            cnt_excluded: 12,
            cnt_memoized: 0,
            warnings: vec!["w".to_string()],
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_copied"], 3);
        assert_eq!(dict_counts["cnt_redirected"], 2);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[COPY]");
        assert_eq!(
            txt,
            "[COPY] copied=3 shared=1 redirected=2 excluded=12 memoized=0 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }

    #[test]
    fn builder_merges_and_deduplicates_warnings() {
        let mut builder = ReportGraphCopyBuilder::default();
        builder.add_copied();
        builder.add_warning("key copied".to_string());

        builder.merge(ReportGraphCopy {
            cnt_copied: 2,
            cnt_excluded: 4,
            warnings: vec!["key copied".to_string(), "other".to_string()],
            ..ReportGraphCopy::default()
        });

        let report = builder.build();
        assert_eq!(report.cnt_copied, 3);
        assert_eq!(report.cnt_excluded, 4);
        assert_eq!(report.warnings, vec!["key copied", "other"]);
    }
}
