//! Manufacturability findings. Violations are data, not errors: an
//! ERROR-level entry means the region cannot be cast as-is, not that the
//! validator failed.

use serde::{Deserialize, Serialize};

/// How bad a violation is for slip casting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Physically impossible to demold; must be fixed or re-regioned.
    Error,
    /// Manufacturable but compromised (e.g. below recommended draft).
    Warning,
    /// An intentional mathematical feature the user elected to keep;
    /// documented, never suppressed.
    Feature,
}

/// One manufacturability finding against a face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub severity: Severity,
    pub description: String,
    pub face: u32,
    /// Magnitude in `[0, 1]`; 1 is worst within the severity level.
    pub score: f32,
    pub remediation: String,
}

/// Ordered collection of violations for one validation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintReport {
    pub violations: Vec<ConstraintViolation>,
}

impl ConstraintReport {
    pub fn push(&mut self, violation: ConstraintViolation) {
        self.violations.push(violation);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn feature_count(&self) -> usize {
        self.count(Severity::Feature)
    }

    /// A region is castable as-is iff it has no ERROR-level findings.
    pub fn is_manufacturable(&self) -> bool {
        self.error_count() == 0
    }

    pub fn merge(&mut self, other: ConstraintReport) {
        self.violations.extend(other.violations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_level() {
        let mut report = ConstraintReport::default();
        report.push(ConstraintViolation {
            severity: Severity::Error,
            description: "undercut at face 3".into(),
            face: 3,
            score: 1.0,
            remediation: "split the region or change pull direction".into(),
        });
        report.push(ConstraintViolation {
            severity: Severity::Warning,
            description: "below recommended 2 degree draft".into(),
            face: 4,
            score: 0.4,
            remediation: "add draft".into(),
        });
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.feature_count(), 0);
        assert!(!report.is_manufacturable());
    }
}
