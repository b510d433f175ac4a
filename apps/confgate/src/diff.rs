//! Line diffs between config versions.
//!
//! Produces the raw unified diff (with `---`/`+++` file headers) and a
//! structured hunk list without those headers. Output depends only on the
//! two texts and their labels, so the same pair always diffs identically.

use crate::error::{Error, Result};
use crate::models::artifact::ConfigVersion;
use crate::store::VersionStore;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use uuid::Uuid;

/// Context lines around each change.
const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line text without its trailing newline.
    pub text: String,
}

impl DiffLine {
    /// The line as it appears in a unified diff (` `, `+` or `-` prefix).
    pub fn render(&self) -> String {
        let sign = match self.kind {
            LineKind::Context => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        };
        format!("{sign}{}", self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    /// `@@ -a,b +c,d @@` locator.
    pub header: String,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub unified_diff: String,
    pub hunks: Vec<Hunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DiffResult {
    /// An empty diff that explains why nothing was compared.
    pub fn empty(message: &str) -> Self {
        Self {
            unified_diff: String::new(),
            hunks: Vec::new(),
            base_version: None,
            current_version: None,
            message: Some(message.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn added(&self) -> usize {
        self.count(LineKind::Added)
    }

    pub fn removed(&self) -> usize {
        self.count(LineKind::Removed)
    }

    fn count(&self, kind: LineKind) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.kind == kind)
            .count()
    }
}

/// Diff two texts. Identical inputs give an empty diff and no hunks.
pub fn diff_text(base: &str, base_label: &str, target: &str, target_label: &str) -> DiffResult {
    let diff = TextDiff::from_lines(base, target);
    let mut unified = diff.unified_diff();
    unified
        .context_radius(CONTEXT_LINES)
        .header(base_label, target_label);

    let hunks = unified
        .iter_hunks()
        .map(|hunk| Hunk {
            header: hunk.header().to_string(),
            lines: hunk
                .iter_changes()
                .map(|change| DiffLine {
                    kind: match change.tag() {
                        ChangeTag::Equal => LineKind::Context,
                        ChangeTag::Insert => LineKind::Added,
                        ChangeTag::Delete => LineKind::Removed,
                    },
                    text: change.value().trim_end_matches(['\n', '\r']).to_string(),
                })
                .collect(),
        })
        .collect();

    DiffResult {
        unified_diff: unified.to_string(),
        hunks,
        base_version: None,
        current_version: None,
        message: None,
    }
}

/// Diff two stored versions, labelled `version_N`.
pub fn diff_pair(base: &ConfigVersion, current: &ConfigVersion) -> DiffResult {
    let mut result = diff_text(&base.content, &base.label(), &current.content, &current.label());
    result.base_version = Some(base.version_number);
    result.current_version = Some(current.version_number);
    result
}

/// Which version to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSelector {
    /// The version numbered one below the target.
    Previous,
    /// An explicit version by id.
    Version(Uuid),
}

/// Diff a stored version against its base.
///
/// With [`BaseSelector::Previous`], version 1 yields an empty diff with an
/// explanatory message. An unknown target or explicit base id is
/// [`Error::NotFound`].
pub fn diff_versions(
    store: &dyn VersionStore,
    version_id: Uuid,
    base: BaseSelector,
) -> Result<DiffResult> {
    let current = store
        .get_version(version_id)
        .ok_or_else(|| Error::not_found("version", version_id.to_string()))?;
    let base_version = match base {
        BaseSelector::Previous => {
            if current.version_number <= 1 {
                return Ok(DiffResult::empty("No previous version to compare"));
            }
            match store.version_by_number(current.config_id, current.version_number - 1) {
                Some(v) => v,
                None => return Ok(DiffResult::empty("Previous version not found")),
            }
        }
        BaseSelector::Version(id) => store
            .get_version(id)
            .ok_or_else(|| Error::not_found("base version", id.to_string()))?,
    };
    Ok(diff_pair(&base_version, &current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::artifact::ConfigType;
    use crate::store::{MemoryStore, NewConfig};

    #[test]
    fn test_identical_texts_have_no_diff() {
        let d = diff_text("a\nb\n", "version_1", "a\nb\n", "version_1");
        assert!(d.unified_diff.is_empty());
        assert!(d.hunks.is_empty());
    }

    #[test]
    fn test_unified_diff_headers_and_hunks() {
        let base = "a\nb\nc\n";
        let target = "a\nB\nc\nd\n";
        let d = diff_text(base, "version_1", target, "version_2");
        assert!(d.unified_diff.starts_with("--- version_1\n+++ version_2\n@@ "));
        assert_eq!(d.hunks.len(), 1);
        let hunk = &d.hunks[0];
        assert!(hunk.header.starts_with("@@ -1,3 +1,4 @@"));
        let rendered: Vec<_> = hunk.lines.iter().map(DiffLine::render).collect();
        assert_eq!(rendered, vec![" a", "-b", "+B", " c", "+d"]);
        assert!(hunk.lines.iter().all(|l| !l.text.starts_with("---")));
        assert_eq!((d.added(), d.removed()), (2, 1));
    }

    #[test]
    fn test_distant_changes_split_into_hunks() {
        let base: String = (0..30).map(|i| format!("line{i}\n")).collect();
        let target = base.replace("line2\n", "LINE2\n").replace("line27\n", "LINE27\n");
        let d = diff_text(&base, "a", &target, "b");
        assert_eq!(d.hunks.len(), 2);
    }

    #[test]
    fn test_diff_is_deterministic() {
        let a = diff_text("x\ny\n", "version_1", "x\nz\n", "version_2");
        let b = diff_text("x\ny\n", "version_1", "x\nz\n", "version_2");
        assert_eq!(a, b);
    }

    #[test]
    fn test_store_backed_base_selection() {
        let store = MemoryStore::new();
        let cfg = store
            .create_config(NewConfig::new("proj", "app", ConfigType::GenericYaml))
            .unwrap();
        let v1 = store.add_version(cfg.id, "a: 1\n", "dev").unwrap().version;
        let v2 = store.add_version(cfg.id, "a: 2\n", "dev").unwrap().version;
        let v3 = store.add_version(cfg.id, "a: 3\n", "dev").unwrap().version;

        let first = diff_versions(&store, v1.id, BaseSelector::Previous).unwrap();
        assert!(first.is_empty());
        assert_eq!(first.message.as_deref(), Some("No previous version to compare"));

        let prev = diff_versions(&store, v3.id, BaseSelector::Previous).unwrap();
        assert_eq!((prev.base_version, prev.current_version), (Some(2), Some(3)));
        assert!(prev.unified_diff.contains("--- version_2"));

        let explicit = diff_versions(&store, v3.id, BaseSelector::Version(v1.id)).unwrap();
        assert_eq!(explicit.base_version, Some(1));

        let same = diff_versions(&store, v2.id, BaseSelector::Version(v2.id)).unwrap();
        assert!(same.is_empty() && same.unified_diff.is_empty());

        let missing = diff_versions(&store, v3.id, BaseSelector::Version(Uuid::new_v4()));
        assert!(missing.unwrap_err().is_not_found());
    }
}
