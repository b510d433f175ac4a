//! Version store contract and the in-memory implementation behind the CLI.
//!
//! Versions are immutable once written. A config's `current_version_id` is
//! advanced in the same critical section that inserts the version, so a
//! reader never observes one without the other.

use crate::error::{Error, Result};
use crate::models::artifact::{checksum, Config, ConfigType, ConfigVersion};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Request to create a config.
#[derive(Debug, Clone)]
pub struct NewConfig {
    pub project_id: String,
    pub title: String,
    pub config_type: ConfigType,
    pub tags: Vec<String>,
}

impl NewConfig {
    pub fn new(project_id: &str, title: &str, config_type: ConfigType) -> Self {
        Self {
            project_id: project_id.to_string(),
            title: title.to_string(),
            config_type,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A freshly written version.
#[derive(Debug, Clone, Serialize)]
pub struct AddedVersion {
    pub version: ConfigVersion,
    /// Number of the previous current version when its content is identical.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<u32>,
}

/// Storage for configs and their versions.
///
/// Implementations must number versions 1, 2, 3, ... per config with no
/// gaps, even when writers for different configs interleave, and must
/// advance the current-version pointer atomically with the insert.
pub trait VersionStore: Send + Sync {
    fn create_config(&self, new: NewConfig) -> Result<Config>;
    fn get_config(&self, id: Uuid) -> Option<Config>;
    fn find_config(&self, project_id: &str, title: &str) -> Option<Config>;
    /// Configs in creation order, optionally restricted to one project.
    fn list_configs(&self, project_id: Option<&str>) -> Vec<Config>;
    /// Remove a config together with all of its versions.
    fn delete_config(&self, id: Uuid) -> Result<Config>;
    fn add_version(&self, config_id: Uuid, content: &str, author: &str) -> Result<AddedVersion>;
    fn get_version(&self, id: Uuid) -> Option<ConfigVersion>;
    /// Versions ordered by ascending number.
    fn list_versions(&self, config_id: Uuid) -> Result<Vec<ConfigVersion>>;
    fn version_by_number(&self, config_id: Uuid, number: u32) -> Option<ConfigVersion>;
    /// Check that the pointer names the highest-numbered version. Mismatches
    /// are reported, never repaired.
    fn verify_consistency(&self, config_id: Uuid) -> Result<()>;

    fn current_version(&self, config_id: Uuid) -> Option<ConfigVersion> {
        let id = self.get_config(config_id)?.current_version_id?;
        self.get_version(id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    configs: Vec<Config>,
    versions: Vec<ConfigVersion>,
}

#[derive(Debug, Default)]
struct State {
    configs: Vec<Config>,
    /// Per config, ordered by version number.
    versions: HashMap<Uuid, Vec<ConfigVersion>>,
}

impl State {
    fn config(&self, id: Uuid) -> Option<&Config> {
        self.configs.iter().find(|c| c.id == id)
    }

    fn check(&self, config: &Config) -> Result<()> {
        let inconsistent = |reason: String| Error::Inconsistent {
            config_id: config.id.to_string(),
            reason,
        };
        let versions = self.versions.get(&config.id).map(Vec::as_slice).unwrap_or(&[]);
        for (idx, v) in versions.iter().enumerate() {
            let expected = idx as u32 + 1;
            if v.version_number != expected {
                return Err(inconsistent(format!(
                    "expected version {expected}, found {}",
                    v.version_number
                )));
            }
            if !v.checksum_matches() {
                return Err(Error::ChecksumMismatch {
                    config_id: config.id.to_string(),
                    version_number: v.version_number,
                });
            }
        }
        let latest = versions.last().map(|v| v.id);
        if latest != config.current_version_id {
            return Err(inconsistent(match config.current_version_id {
                Some(id) if !versions.iter().any(|v| v.id == id) => {
                    format!("current version {id} does not exist")
                }
                Some(id) => format!("current version {id} is not the latest version"),
                None => "current version is unset but versions exist".to_string(),
            }));
        }
        Ok(())
    }
}

/// Process-local store with optional JSON snapshot persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot; a missing file gives an empty store. Every checksum,
    /// version sequence and pointer is verified before the store is returned.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no store snapshot, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let snapshot: Snapshot = serde_json::from_str(&text).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_snapshot(snapshot)?;
        tracing::debug!(
            path = %path.display(),
            configs = store.read().configs.len(),
            "store loaded"
        );
        Ok(store)
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut state = State {
            configs: snapshot.configs,
            versions: HashMap::new(),
        };
        for v in snapshot.versions {
            if state.config(v.config_id).is_none() {
                return Err(Error::Inconsistent {
                    config_id: v.config_id.to_string(),
                    reason: format!("version {} belongs to an unknown config", v.id),
                });
            }
            state.versions.entry(v.config_id).or_default().push(v);
        }
        for list in state.versions.values_mut() {
            list.sort_by_key(|v| v.version_number);
        }
        for config in &state.configs {
            state.check(config)?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Write the whole store as pretty JSON, creating parent directories.
    /// The snapshot goes to a sibling temp file first and is renamed into
    /// place, so an interrupted save leaves the previous snapshot intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        let state = self.read();
        let snapshot = Snapshot {
            configs: state.configs.clone(),
            versions: state
                .configs
                .iter()
                .filter_map(|c| state.versions.get(&c.id))
                .flatten()
                .cloned()
                .collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let staged = staging_path(path);
        fs::write(&staged, json + "\n").map_err(write_err)?;
        fs::rename(&staged, path).map_err(write_err)
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl VersionStore for MemoryStore {
    fn create_config(&self, new: NewConfig) -> Result<Config> {
        if !new.config_type.is_known() {
            return Err(Error::InvalidConfigType(new.config_type.tag().to_string()));
        }
        let project_id = new.project_id.trim();
        if project_id.is_empty() {
            return Err(Error::not_found("project", new.project_id.clone()));
        }
        let mut state = self.write();
        if state
            .configs
            .iter()
            .any(|c| c.project_id == project_id && c.title == new.title)
        {
            return Err(Error::DuplicateConfig(new.title));
        }
        let config = Config {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            title: new.title,
            config_type: new.config_type,
            tags: new.tags,
            current_version_id: None,
            created_at: Utc::now(),
        };
        state.configs.push(config.clone());
        tracing::info!(config = %config.title, config_type = %config.config_type, "config created");
        Ok(config)
    }

    fn get_config(&self, id: Uuid) -> Option<Config> {
        self.read().config(id).cloned()
    }

    fn find_config(&self, project_id: &str, title: &str) -> Option<Config> {
        self.read()
            .configs
            .iter()
            .find(|c| c.project_id == project_id && c.title == title)
            .cloned()
    }

    fn list_configs(&self, project_id: Option<&str>) -> Vec<Config> {
        self.read()
            .configs
            .iter()
            .filter(|c| project_id.is_none_or(|p| c.project_id == p))
            .cloned()
            .collect()
    }

    fn delete_config(&self, id: Uuid) -> Result<Config> {
        let mut state = self.write();
        let pos = state
            .configs
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::not_found("config", id.to_string()))?;
        let config = state.configs.remove(pos);
        let removed = state.versions.remove(&id).map_or(0, |v| v.len());
        tracing::info!(config = %config.title, versions = removed, "config deleted");
        Ok(config)
    }

    fn add_version(&self, config_id: Uuid, content: &str, author: &str) -> Result<AddedVersion> {
        let mut guard = self.write();
        let State { configs, versions } = &mut *guard;
        let config = configs
            .iter_mut()
            .find(|c| c.id == config_id)
            .ok_or_else(|| Error::not_found("config", config_id.to_string()))?;
        let list = versions.entry(config_id).or_default();

        let sum = checksum(content);
        let duplicate_of = config
            .current_version_id
            .and_then(|id| list.iter().find(|v| v.id == id))
            .filter(|v| v.checksum == sum)
            .map(|v| v.version_number);

        let version = ConfigVersion {
            id: Uuid::new_v4(),
            config_id,
            version_number: list.last().map_or(1, |v| v.version_number + 1),
            content: content.to_string(),
            checksum: sum,
            created_by: author.to_string(),
            created_at: Utc::now(),
        };
        list.push(version.clone());
        config.current_version_id = Some(version.id);

        tracing::info!(
            config = %config.title,
            version = version.version_number,
            checksum = %version.checksum,
            "version created"
        );
        Ok(AddedVersion {
            version,
            duplicate_of,
        })
    }

    fn get_version(&self, id: Uuid) -> Option<ConfigVersion> {
        self.read()
            .versions
            .values()
            .flatten()
            .find(|v| v.id == id)
            .cloned()
    }

    fn list_versions(&self, config_id: Uuid) -> Result<Vec<ConfigVersion>> {
        let state = self.read();
        if state.config(config_id).is_none() {
            return Err(Error::not_found("config", config_id.to_string()));
        }
        Ok(state.versions.get(&config_id).cloned().unwrap_or_default())
    }

    fn version_by_number(&self, config_id: Uuid, number: u32) -> Option<ConfigVersion> {
        self.read()
            .versions
            .get(&config_id)?
            .iter()
            .find(|v| v.version_number == number)
            .cloned()
    }

    fn verify_consistency(&self, config_id: Uuid) -> Result<()> {
        let state = self.read();
        let config = state
            .config(config_id)
            .ok_or_else(|| Error::not_found("config", config_id.to_string()))?;
        state.check(config)
    }
}
