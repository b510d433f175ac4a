//! Configuration discovery and effective settings resolution.
//!
//! Confgate reads `confgate.toml|yaml|yml` from the repository root (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config.
//! Defaults:
//! - `output`: `human`
//! - `store`: `.confgate/store.json`
//! - `policies`: unset
//! - `project`: unset (store commands fall back to `default`)
//! - `default_type`: `GENERIC_YAML`
//! - `log.level`: `warn`, `log.json`: false
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::models::artifact::ConfigType;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_NAMES: [&str; 3] = ["confgate.toml", "confgate.yaml", "confgate.yml"];

/// Project used by store commands when none is configured.
pub const DEFAULT_PROJECT: &str = "default";

#[derive(Debug, Default, Deserialize, Clone)]
/// Logging section under `[log]`.
pub struct LogCfg {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `confgate.toml|yaml`.
pub struct ConfgateConfig {
    pub output: Option<String>,
    pub store: Option<String>,
    pub policies: Option<String>,
    pub project: Option<String>,
    pub default_type: Option<String>,
    #[serde(default)]
    pub log: Option<LogCfg>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub output: String,
    /// Store snapshot path.
    pub store: PathBuf,
    pub policies: Option<PathBuf>,
    pub project: Option<String>,
    pub default_type: ConfigType,
    pub log_level: String,
    pub log_json: bool,
    /// Whether a config file was found during discovery.
    pub config_found: bool,
}

impl Effective {
    pub fn json(&self) -> bool {
        self.output == "json"
    }

    /// Project for store commands.
    pub fn store_project(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_PROJECT)
    }

    /// Type for a file: explicit tag, then a `.tf` extension hint, then
    /// `default_type`.
    pub fn type_for(&self, explicit: Option<&str>, path: &Path) -> ConfigType {
        if let Some(tag) = explicit {
            return ConfigType::from_tag(tag);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("tf") => ConfigType::Terraform,
            _ => self.default_type.clone(),
        }
    }
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `confgate.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `ConfgateConfig` from `confgate.toml` or `confgate.yaml|yml` if present.
pub fn load_config(root: &Path) -> Option<ConfgateConfig> {
    let toml_path = root.join("confgate.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path).ok()?;
        let cfg: ConfgateConfig = toml::from_str(&s).ok()?;
        return Some(cfg);
    }
    for yml in ["confgate.yaml", "confgate.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p).ok()?;
            let cfg: ConfgateConfig = serde_yaml::from_str(&s).ok()?;
            return Some(cfg);
        }
    }
    None
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli_output: Option<&str>,
    cli_store: Option<&str>,
    cli_policies: Option<&str>,
    cli_project: Option<&str>,
) -> Effective {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let loaded = load_config(&repo_root);
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    // CLI paths are taken as given; file paths are relative to the repo root
    let store = cli_store.map(PathBuf::from).unwrap_or_else(|| {
        repo_root.join(cfg.store.as_deref().unwrap_or(".confgate/store.json"))
    });

    let policies = cli_policies
        .map(PathBuf::from)
        .or_else(|| cfg.policies.as_deref().map(|p| repo_root.join(p)));

    let project = cli_project
        .map(|s| s.to_string())
        .or(cfg.project)
        .filter(|p| !p.trim().is_empty());

    let default_type = cfg
        .default_type
        .as_deref()
        .map(ConfigType::from_tag)
        .unwrap_or(ConfigType::GenericYaml);

    let log_level = cfg
        .log
        .as_ref()
        .and_then(|l| l.level.clone())
        .unwrap_or_else(|| "warn".to_string());
    let log_json = cfg.log.as_ref().and_then(|l| l.json).unwrap_or(false);

    Effective {
        repo_root,
        store,
        output,
        policies,
        project,
        default_type,
        log_level,
        log_json,
        config_found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("confgate.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output = "json"
store = "state/configs.json"
policies = "policies.toml"
project = "infra"
default_type = "K8S_YAML"
[log]
level = "debug"
json = true
    "#
        )
        .unwrap();

        // Resolve using explicit repo_root to avoid global CWD races
        let eff = resolve_effective(root.to_str(), None, None, None, None);
        assert!(eff.config_found);
        assert!(eff.json());
        assert_eq!(eff.store, root.join("state/configs.json"));
        assert_eq!(eff.policies, Some(root.join("policies.toml")));
        assert_eq!(eff.store_project(), "infra");
        assert_eq!(eff.default_type, ConfigType::K8sYaml);
        assert_eq!(eff.log_level, "debug");
        assert!(eff.log_json);
    }

    #[test]
    fn test_load_yaml_and_defaults() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("confgate.yaml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
output: human
log:
  level: info
            "#
        )
        .unwrap();

        let eff = resolve_effective(root.to_str(), None, None, None, None);
        assert_eq!(eff.output, "human");
        assert_eq!(eff.log_level, "info");
        assert!(!eff.log_json);
        assert_eq!(eff.store, root.join(".confgate/store.json"));
        assert!(eff.policies.is_none());
        assert_eq!(eff.store_project(), DEFAULT_PROJECT);
        assert_eq!(eff.default_type, ConfigType::GenericYaml);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("confgate.toml"),
            "output = \"json\"\nproject = \"infra\"\nstore = \"a.json\"\n",
        )
        .unwrap();

        let eff = resolve_effective(
            root.to_str(),
            Some("human"),
            Some("b.json"),
            Some("p.toml"),
            Some("web"),
        );
        assert_eq!(eff.output, "human");
        assert_eq!(eff.store, PathBuf::from("b.json"));
        assert_eq!(eff.policies, Some(PathBuf::from("p.toml")));
        assert_eq!(eff.project.as_deref(), Some("web"));
    }

    #[test]
    fn test_discovery_walks_up_to_config() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("confgate.toml"), "project = \"up\"\n").unwrap();
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(detect_repo_root(&nested), root.to_path_buf());
        let eff = resolve_effective(nested.to_str(), None, None, None, None);
        assert_eq!(eff.project.as_deref(), Some("up"));
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let eff = resolve_effective(dir.path().to_str(), None, None, None, None);
        assert!(!eff.config_found);
        assert_eq!(eff.output, "human");
        assert_eq!(eff.log_level, "warn");
    }

    #[test]
    fn test_type_inference() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let eff = resolve_effective(dir.path().to_str(), None, None, None, None);
        assert_eq!(
            eff.type_for(None, Path::new("main.tf")),
            ConfigType::Terraform
        );
        assert_eq!(
            eff.type_for(None, Path::new("deploy.yaml")),
            ConfigType::GenericYaml
        );
        assert_eq!(
            eff.type_for(Some("K8S_YAML"), Path::new("main.tf")),
            ConfigType::K8sYaml
        );
    }
}
