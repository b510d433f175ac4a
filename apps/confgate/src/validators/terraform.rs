//! Heuristic Terraform checks.
//!
//! No HCL grammar is parsed. Blocks are located with patterns and their
//! bodies are cut out with a balanced-brace scan that understands string
//! literals and comments, so arbitrarily nested blocks are handled.

use super::oversized;
use crate::models::{Issue, ValidationReport};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PROVIDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"provider\s+""#).expect("static pattern"));
static RESOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"resource\s+"([^"]+)"\s+"([^"]+)""#).expect("static pattern")
});
static TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^tags\s*=\s*\{").expect("static pattern"));
static TAG_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:^|[{,\s])"?([A-Za-z_][A-Za-z0-9_\-]*)"?\s*[=:]"#).expect("static pattern")
});
static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"variable\s+"([^"]+)""#).expect("static pattern"));
static VAR_USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\.([a-zA-Z_][a-zA-Z0-9_]*)").expect("static pattern"));

/// Validate Terraform source text.
///
/// - ERROR when no provider block is declared.
/// - WARN when no resources are declared.
/// - WARN per resource without a `tags = { ... }` block, or whose tags
///   lack `environment` / `owner` (case-insensitive).
/// - INFO per declared variable that is never referenced as `var.<name>`.
pub fn validate_terraform(content: &str) -> ValidationReport {
    if let Some(report) = oversized(content) {
        return report;
    }
    let mut issues = Vec::new();

    if !PROVIDER_RE.is_match(content) {
        issues.push(Issue::error("MISSING_PROVIDER", "No provider block found"));
    }

    let mut resources = 0usize;
    for caps in RESOURCE_RE.captures_iter(content) {
        resources += 1;
        let (Some(whole), Some(rtype), Some(rname)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let label = format!("{}.{}", rtype.as_str(), rname.as_str());
        let Some(body) = block_after(content, whole.end()) else {
            tracing::debug!(resource = %label, "resource without a readable body");
            continue;
        };
        check_tags(body, &label, &mut issues);
    }
    if resources == 0 {
        issues.push(Issue::warn("NO_RESOURCES", "No resource blocks found"));
    }

    let declared: BTreeSet<&str> = VARIABLE_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let used: BTreeSet<&str> = VAR_USE_RE
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    for var in declared.difference(&used) {
        issues.push(
            Issue::info(
                "UNUSED_VARIABLE",
                format!("Variable '{var}' declared but not used"),
            )
            .at(format!("variable.{var}")),
        );
    }

    ValidationReport::from_issues(issues)
}

fn check_tags(body: &str, label: &str, issues: &mut Vec<Issue>) {
    let path = format!("resource.{label}");
    let Some(tags) = top_level_tags(body) else {
        issues.push(
            Issue::warn(
                "MISSING_TAGS",
                format!("Resource '{label}' has no tags block"),
            )
            .at(path),
        );
        return;
    };

    let keys: BTreeSet<String> = TAG_KEY_RE
        .captures_iter(tags)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_ascii_lowercase()))
        .collect();
    if !keys.contains("environment") {
        issues.push(
            Issue::warn(
                "MISSING_ENVIRONMENT_TAG",
                format!("Resource '{label}' missing 'environment' tag"),
            )
            .at(path.clone()),
        );
    }
    if !keys.contains("owner") {
        issues.push(
            Issue::warn(
                "MISSING_OWNER_TAG",
                format!("Resource '{label}' missing 'owner' tag"),
            )
            .at(path),
        );
    }
}

/// Body of the `{ ... }` block whose opening brace is the first
/// non-whitespace character at or after `from`. `None` when there is no
/// such brace or it is never closed.
fn block_after(text: &str, from: usize) -> Option<&str> {
    let rest = text.get(from..)?;
    let open = from + (rest.len() - rest.trim_start().len());
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let close = matching_brace(text, open)?;
    text.get(open + 1..close)
}

/// Body of the resource's own `tags = { ... }` block. Nested blocks are
/// stepped over whole, so a `tags` inside `root_block_device { ... }` is
/// never taken for the resource's tags.
fn top_level_tags(body: &str) -> Option<&str> {
    let bytes = body.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else if let Some(end) = comment_end(bytes, i) {
            i = end;
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => i = matching_brace(body, i)?,
                b't' if i == 0 || !is_ident(bytes[i - 1]) => {
                    if let Some(m) = TAGS_RE.find(&body[i..]) {
                        return block_after(body, i + m.end() - 1);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Index of the brace closing the one at `open`, tracking depth with an
/// explicit counter. Braces inside `"..."` strings and comments are ignored.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else if let Some(end) = comment_end(bytes, i) {
            i = end;
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Last byte of the `#`, `//` or `/* */` comment starting at `i`, if one
/// starts there. Unterminated comments run to the end of input.
fn comment_end(bytes: &[u8], i: usize) -> Option<usize> {
    match (bytes[i], bytes.get(i + 1)) {
        (b'#', _) | (b'/', Some(b'/')) => Some(skip_line(bytes, i)),
        (b'/', Some(b'*')) => Some(
            bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |p| i + 2 + p + 1),
        ),
        _ => None,
    }
}

/// Position of the next newline (or end of input).
fn skip_line(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}
