//! Policy schema loaded from TOML policy files.
//!
//! ```toml
//! [[policies]]
//! name = "no-latest"
//! scope = "GLOBAL"
//! type = "K8S_YAML"
//! rule = "NOT MATCHES(':\\s*latest\\b')"
//! ```
//!
//! `type` is advisory: it narrows which configs a policy is selected for,
//! the rule engine itself never looks at it.

use super::artifact::ConfigType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
/// Root of a policy file.
pub struct PolicyFile {
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyScope {
    #[default]
    Global,
    Project,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// A named rule expression with scope and advisory type.
pub struct PolicyRule {
    pub name: String,
    #[serde(default)]
    pub scope: PolicyScope,
    /// Required when `scope = "PROJECT"`.
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default, rename = "type")]
    pub config_type: Option<ConfigType>,
    pub rule: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PolicyRule {
    /// Whether this policy is selected for a config of `config_type` in `project`.
    ///
    /// Global policies match every project; project policies match only
    /// their own. A declared type restricts selection only when it names a
    /// known config type.
    pub fn applies_to(&self, project: Option<&str>, config_type: &ConfigType) -> bool {
        let scope_ok = match self.scope {
            PolicyScope::Global => true,
            PolicyScope::Project => match (self.project.as_deref(), project) {
                (Some(mine), Some(theirs)) => mine == theirs,
                _ => false,
            },
        };
        let type_ok = match self.config_type.as_ref() {
            Some(t) if t.is_known() => t == config_type,
            _ => true,
        };
        scope_ok && type_ok
    }
}
