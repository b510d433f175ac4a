//! Simulated apply.
//!
//! Nothing is contacted. The changed-resource count is derived from the
//! version checksum, so a given version always reports the same plan.

use crate::error::{Error, Result};
use crate::models::artifact::ConfigType;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    pub success: bool,
    pub summary: String,
    pub changed_resources: u32,
    pub diff_summary: String,
}

/// Simulate applying a version of `title` whose content hashes to `checksum`.
///
/// The first eight hex characters of the checksum, read as an integer,
/// give `value % 10 + 1` changed resources.
pub fn dry_run(checksum: &str, config_type: &ConfigType, title: &str) -> Result<DryRunReport> {
    let changed = changed_resources(checksum)?;
    let (summary, diff_summary) = match config_type {
        ConfigType::K8sYaml => (
            format!("Would apply Kubernetes resources from {title}"),
            format!("+ {changed} resources would be created/updated"),
        ),
        ConfigType::Terraform => (
            format!("Terraform plan for {title}"),
            format!("Plan: {changed} to add, 0 to change, 0 to destroy"),
        ),
        _ => (
            format!("Dry-run for {title}"),
            format!("{changed} changes detected"),
        ),
    };
    tracing::debug!(%title, %config_type, changed, "dry-run simulated");
    Ok(DryRunReport {
        success: true,
        summary,
        changed_resources: changed,
        diff_summary,
    })
}

fn changed_resources(checksum: &str) -> Result<u32> {
    let prefix = checksum
        .get(..8)
        .filter(|p| p.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| Error::InvalidChecksum(checksum.to_string()))?;
    let value =
        u32::from_str_radix(prefix, 16).map_err(|_| Error::InvalidChecksum(checksum.to_string()))?;
    Ok(value % 10 + 1)
}
