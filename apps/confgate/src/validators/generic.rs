//! Baseline checks for any YAML document.

use super::{invalid_yaml, join_key, oversized, untag};
use crate::models::{Issue, ValidationReport};
use serde_yaml::Value as Yaml;

/// Validate a single YAML document: the root must be a mapping, and keys
/// should be snake_case.
pub fn validate_generic_yaml(content: &str) -> ValidationReport {
    if let Some(report) = oversized(content) {
        return report;
    }
    let data: Yaml = match serde_yaml::from_str(content) {
        Ok(v) => v,
        Err(e) => return invalid_yaml(&e),
    };

    let mut issues = Vec::new();
    let root = untag(&data);
    if root.is_mapping() {
        check_keys(root, "", &mut issues);
    } else {
        issues.push(Issue::error(
            "ROOT_NOT_MAPPING",
            "YAML root must be a mapping (dictionary)",
        ));
    }
    ValidationReport::from_issues(issues)
}

/// Walk mappings and sequences, flagging keys that break snake_case.
fn check_keys(value: &Yaml, path: &str, issues: &mut Vec<Issue>) {
    match untag(value) {
        Yaml::Mapping(map) => {
            for (k, v) in map {
                let key = key_text(k);
                let key_path = join_key(path, &key);
                if matches!(untag(k), Yaml::String(_)) && is_non_snake_case(&key) {
                    issues.push(
                        Issue::warn(
                            "NON_SNAKE_CASE_KEY",
                            format!("Key '{key}' is not in snake_case format"),
                        )
                        .at(key_path.clone()),
                    );
                }
                check_keys(v, &key_path, issues);
            }
        }
        Yaml::Sequence(seq) => {
            for (idx, item) in seq.iter().enumerate() {
                check_keys(item, &format!("{path}[{idx}]"), issues);
            }
        }
        _ => {}
    }
}

fn key_text(k: &Yaml) -> String {
    match untag(k) {
        Yaml::String(s) => s.clone(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        Yaml::Null => "null".to_string(),
        _ => "?".to_string(),
    }
}

/// Mixed case, spaces and hyphens are flagged. Keys with other punctuation
/// (`app.kubernetes.io/name`, `$schema`) are exempt.
fn is_non_snake_case(key: &str) -> bool {
    let plain = key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '));
    if !plain {
        return false;
    }
    key.chars().any(char::is_uppercase) || key.contains(' ') || key.contains('-')
}
