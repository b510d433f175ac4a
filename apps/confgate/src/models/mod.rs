//! Shared data models for validation reports, stored artifacts, and policies.

pub mod artifact;
pub mod policy;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// Severity of a single validation issue.
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
/// Aggregate status of a validation report.
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pass => "PASS",
            Status::Warn => "WARN",
            Status::Fail => "FAIL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single validation issue with level, stable code and optional locator.
pub struct Issue {
    pub level: Level,
    pub code: String,
    pub message: String,
    pub path: Option<String>,
}

impl Issue {
    pub fn new(level: Level, code: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.to_string(),
            message: message.into(),
            path: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(Level::Error, code, message)
    }

    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self::new(Level::Warn, code, message)
    }

    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::new(Level::Info, code, message)
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Validation result for one piece of content.
///
/// `status` is always derived from `issues`; build reports through
/// [`ValidationReport::from_issues`] so the two never disagree.
pub struct ValidationReport {
    pub status: Status,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// FAIL when any ERROR exists, WARN when any WARN exists, PASS otherwise.
    /// INFO issues never influence the status.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let status = if issues.iter().any(|i| i.level == Level::Error) {
            Status::Fail
        } else if issues.iter().any(|i| i.level == Level::Warn) {
            Status::Warn
        } else {
            Status::Pass
        };
        Self { status, issues }
    }

    pub fn count(&self, level: Level) -> usize {
        self.issues.iter().filter(|i| i.level == level).count()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

#[derive(Debug, Serialize)]
/// Report for one file validated from the CLI.
pub struct FileReport {
    pub file: String,
    #[serde(rename = "type")]
    pub config_type: String,
    #[serde(flatten)]
    pub report: ValidationReport,
}

#[derive(Debug, Default, Serialize)]
/// Aggregated counts used by printers.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub files: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut s = Summary {
            files: reports.len(),
            ..Summary::default()
        };
        for r in reports {
            s.errors += r.report.count(Level::Error);
            s.warnings += r.report.count(Level::Warn);
            s.infos += r.report.count(Level::Info);
            if r.report.status == Status::Fail {
                s.failed += 1;
            }
        }
        s
    }
}
