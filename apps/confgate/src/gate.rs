//! Batch validation of files matched by glob patterns.
//!
//! Targets are collected first, validated in parallel with rayon, then
//! sorted by display path so output is stable across runs.

use crate::error::{Error, Result};
use crate::models::artifact::ConfigType;
use crate::models::{FileReport, Issue, Summary, ValidationReport};
use crate::utils::rel_display;
use crate::validators;
use glob::glob;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of validating every file matched by a set of patterns.
#[derive(Debug, Default)]
pub struct ValidateRun {
    pub reports: Vec<FileReport>,
    /// Patterns that matched no file.
    pub unmatched: Vec<String>,
    pub summary: Summary,
}

impl ValidateRun {
    pub fn failed(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Expand `patterns`, dropping duplicates and directories.
pub fn expand_patterns(patterns: &[String]) -> Result<(Vec<PathBuf>, Vec<String>)> {
    let mut targets = BTreeSet::new();
    let mut unmatched = Vec::new();
    for pattern in patterns {
        let entries = glob(pattern).map_err(|source| Error::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        let mut matched = false;
        for entry in entries.flatten() {
            if entry.is_file() {
                matched = true;
                targets.insert(entry);
            }
        }
        if !matched {
            unmatched.push(pattern.clone());
        }
    }
    Ok((targets.into_iter().collect(), unmatched))
}

/// Validate every file matched by `patterns`. `type_of` picks the config
/// type per file. Unreadable files produce a failing report instead of
/// aborting the batch.
pub fn run_validate<F>(root: &Path, patterns: &[String], type_of: F) -> Result<ValidateRun>
where
    F: Fn(&Path) -> ConfigType + Sync,
{
    let (targets, unmatched) = expand_patterns(patterns)?;
    tracing::debug!(files = targets.len(), "validating targets");

    let mut reports: Vec<FileReport> = targets
        .par_iter()
        .map(|path| {
            let config_type = type_of(path);
            let report = match fs::read_to_string(path) {
                Ok(content) => validators::validate(&content, &config_type),
                Err(e) => ValidationReport::from_issues(vec![Issue::error(
                    "UNREADABLE_FILE",
                    format!("Cannot read file: {e}"),
                )]),
            };
            FileReport {
                file: rel_display(root, path),
                config_type: config_type.tag().to_string(),
                report,
            }
        })
        .collect();
    reports.sort_by(|a, b| a.file.cmp(&b.file));

    let summary = Summary::from_reports(&reports);
    Ok(ValidateRun {
        reports,
        unmatched,
        summary,
    })
}
