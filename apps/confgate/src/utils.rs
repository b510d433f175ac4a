//! Small presentation helpers shared by the binary and output printers.

use owo_colors::OwoColorize;
use std::path::Path;

/// True unless `NO_COLOR` is set.
pub fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn prefix(label: &str, paint: fn(&str) -> String) -> String {
    if colors_enabled() {
        paint(label)
    } else {
        label.to_string()
    }
}

pub fn error_prefix() -> String {
    prefix("error:", |s| s.red().bold().to_string())
}

pub fn note_prefix() -> String {
    prefix("note:", |s| s.yellow().bold().to_string())
}

pub fn info_prefix() -> String {
    prefix("info:", |s| s.blue().bold().to_string())
}

/// `path` relative to `root` when it lives underneath it, else as given.
pub fn rel_display(root: &Path, path: &Path) -> String {
    match pathdiff::diff_paths(path, root) {
        Some(rel) if !rel.starts_with("..") && !rel.as_os_str().is_empty() => {
            rel.to_string_lossy().to_string()
        }
        _ => path.to_string_lossy().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rel_display() {
        let root = Path::new("/repo");
        assert_eq!(rel_display(root, Path::new("/repo/k8s/app.yaml")), "k8s/app.yaml");
        assert_eq!(rel_display(root, Path::new("/elsewhere/x.tf")), "/elsewhere/x.tf");
        assert_eq!(rel_display(root, Path::new("/repo")), "/repo");
    }

    #[test]
    fn test_prefixes_carry_label() {
        assert!(error_prefix().contains("error:"));
        assert!(note_prefix().contains("note:"));
        assert!(info_prefix().contains("info:"));
    }
}
