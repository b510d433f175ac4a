//! Stored artifact schema: configs, their immutable versions, and type tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Declared format of a config. Unrecognized tags are preserved verbatim
/// and validated with the generic validator.
pub enum ConfigType {
    K8sYaml,
    Terraform,
    GenericYaml,
    Other(String),
}

impl ConfigType {
    pub const KNOWN: [ConfigType; 3] = [
        ConfigType::K8sYaml,
        ConfigType::Terraform,
        ConfigType::GenericYaml,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "K8S_YAML" => ConfigType::K8sYaml,
            "TERRAFORM" => ConfigType::Terraform,
            "GENERIC_YAML" => ConfigType::GenericYaml,
            other => ConfigType::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            ConfigType::K8sYaml => "K8S_YAML",
            ConfigType::Terraform => "TERRAFORM",
            ConfigType::GenericYaml => "GENERIC_YAML",
            ConfigType::Other(s) => s.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ConfigType::Other(_))
    }
}

impl From<String> for ConfigType {
    fn from(s: String) -> Self {
        ConfigType::from_tag(&s)
    }
}

impl From<ConfigType> for String {
    fn from(t: ConfigType) -> Self {
        t.tag().to_string()
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A named container for the versions of one infrastructure artifact.
pub struct Config {
    pub id: Uuid,
    pub project_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Always a version of this config, or `None` before the first version.
    pub current_version_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Immutable snapshot of a config's content.
pub struct ConfigVersion {
    pub id: Uuid,
    pub config_id: Uuid,
    pub version_number: u32,
    pub content: String,
    pub checksum: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ConfigVersion {
    /// Label used in diff headers, e.g. `version_3`.
    pub fn label(&self) -> String {
        format!("version_{}", self.version_number)
    }

    pub fn checksum_matches(&self) -> bool {
        checksum(&self.content) == self.checksum
    }
}

/// Lowercase hex SHA-256 of the UTF-8 content.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_roundtrips_tags() {
        for t in ConfigType::KNOWN {
            assert_eq!(ConfigType::from_tag(t.tag()), t);
        }
        let other = ConfigType::from_tag("HELM_CHART");
        assert_eq!(other, ConfigType::Other("HELM_CHART".into()));
        assert!(!other.is_known());
    }

    #[test]
    fn test_config_type_tags_match_exactly() {
        assert_eq!(
            ConfigType::from_tag(" K8S_YAML "),
            ConfigType::Other(" K8S_YAML ".into())
        );
        assert_eq!(
            ConfigType::from_tag("terraform"),
            ConfigType::Other("terraform".into())
        );
    }

    #[test]
    fn test_config_type_serde_as_string() {
        let v = serde_json::to_value(ConfigType::Terraform).unwrap();
        assert_eq!(v, "TERRAFORM");
        let t: ConfigType = serde_json::from_value(serde_json::json!("K8S_YAML")).unwrap();
        assert_eq!(t, ConfigType::K8sYaml);
    }

    #[test]
    fn test_checksum_known_vector() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(checksum("a: 1"), checksum("a: 1"));
        assert_ne!(checksum("a: 1"), checksum("a: 2"));
    }
}
