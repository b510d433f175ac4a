//! Structural validators and the type-tag registry that dispatches to them.
//!
//! Every validator shares the same contract: oversized input and
//! unparsable documents end the call with a single ERROR, everything else
//! accumulates. Dispatch is by exact type tag; unknown tags fall back to
//! the generic validator so new formats still get baseline checks.

pub mod generic;
pub mod k8s;
pub mod terraform;

use crate::models::artifact::ConfigType;
use crate::models::{Issue, ValidationReport};
use std::collections::HashMap;
use std::sync::LazyLock;

pub use generic::validate_generic_yaml;
pub use k8s::validate_k8s_yaml;
pub use terraform::validate_terraform;

/// Maximum accepted content size in bytes (1 MiB).
pub const MAX_SIZE_BYTES: usize = 1024 * 1024;

/// A structural check for one artifact format.
pub trait Validator: Send + Sync {
    fn validate(&self, content: &str) -> ValidationReport;
}

impl<F> Validator for F
where
    F: Fn(&str) -> ValidationReport + Send + Sync,
{
    fn validate(&self, content: &str) -> ValidationReport {
        (self)(content)
    }
}

/// Type tag to validator table with a fixed fallback entry.
pub struct Registry {
    table: HashMap<String, Box<dyn Validator>>,
    fallback: Box<dyn Validator>,
}

impl Registry {
    /// Registry with no entries; everything dispatches to `fallback`.
    pub fn new(fallback: Box<dyn Validator>) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// The built-in K8S / Terraform / generic table.
    pub fn with_defaults() -> Self {
        let mut reg = Registry::new(Box::new(validate_generic_yaml));
        reg.register(ConfigType::K8sYaml.tag(), Box::new(validate_k8s_yaml));
        reg.register(ConfigType::Terraform.tag(), Box::new(validate_terraform));
        reg.register(ConfigType::GenericYaml.tag(), Box::new(validate_generic_yaml));
        reg
    }

    pub fn register(&mut self, tag: &str, validator: Box<dyn Validator>) {
        self.table.insert(tag.to_string(), validator);
    }

    pub fn get(&self, tag: &str) -> &dyn Validator {
        self.table
            .get(tag)
            .map(|v| v.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn validate(&self, content: &str, config_type: &ConfigType) -> ValidationReport {
        let report = self.get(config_type.tag()).validate(content);
        tracing::debug!(
            config_type = %config_type,
            status = %report.status,
            issues = report.issues.len(),
            "validated content"
        );
        report
    }
}

static DEFAULT_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::with_defaults);

/// Validate `content` with the validator registered for `config_type`.
pub fn validate(content: &str, config_type: &ConfigType) -> ValidationReport {
    DEFAULT_REGISTRY.validate(content, config_type)
}

/// Single FILE_TOO_LARGE report when `content` exceeds the ceiling.
pub(crate) fn oversized(content: &str) -> Option<ValidationReport> {
    let size = content.len();
    if size <= MAX_SIZE_BYTES {
        return None;
    }
    Some(ValidationReport::from_issues(vec![Issue::error(
        "FILE_TOO_LARGE",
        format!("File size {size} bytes exceeds maximum {MAX_SIZE_BYTES} bytes"),
    )]))
}

pub(crate) fn invalid_yaml(err: &serde_yaml::Error) -> ValidationReport {
    ValidationReport::from_issues(vec![Issue::error(
        "INVALID_YAML",
        format!("Invalid YAML syntax: {err}"),
    )])
}

/// Strip YAML tags (`!Ref`, `!!map`) so checks see the underlying value.
pub(crate) fn untag(v: &serde_yaml::Value) -> &serde_yaml::Value {
    match v {
        serde_yaml::Value::Tagged(t) => untag(&t.value),
        other => other,
    }
}

/// `parent.key`, or just `key` at the root.
pub(crate) fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    #[test]
    fn test_unknown_type_falls_back_to_generic() {
        let report = validate("- a\n- b\n", &ConfigType::from_tag("HELM_CHART"));
        assert!(report.has_code("ROOT_NOT_MAPPING"));
    }

    #[test]
    fn test_dispatch_by_exact_tag() {
        let tf = validate("resource \"a\" \"b\" {}", &ConfigType::Terraform);
        assert!(tf.has_code("MISSING_PROVIDER"));
        let k8s = validate("kind: Pod\n", &ConfigType::K8sYaml);
        assert!(k8s.has_code("MISSING_API_VERSION"));
        // padded tags are not recognized and go to the generic validator
        let padded = validate("kind: Pod\n", &ConfigType::from_tag(" K8S_YAML "));
        assert!(!padded.has_code("MISSING_API_VERSION"));
    }

    #[test]
    fn test_custom_registration_overrides_fallback() {
        let mut reg = Registry::new(Box::new(|_: &str| ValidationReport::from_issues(vec![])));
        reg.register(
            "STRICT",
            Box::new(|_: &str| ValidationReport::from_issues(vec![Issue::error("NOPE", "no")])),
        );
        let strict = ConfigType::from_tag("STRICT");
        assert_eq!(reg.validate("x", &strict).status, Status::Fail);
        assert_eq!(reg.validate("x", &ConfigType::K8sYaml).status, Status::Pass);
    }

    #[test]
    fn test_oversized_content_short_circuits_every_validator() {
        let big = "a".repeat(MAX_SIZE_BYTES + 1);
        for t in ConfigType::KNOWN {
            let r = validate(&big, &t);
            assert_eq!(r.issues.len(), 1, "{t}");
            assert_eq!(r.issues[0].code, "FILE_TOO_LARGE");
            assert_eq!(r.status, Status::Fail);
        }
    }

    #[test]
    fn test_exact_ceiling_is_accepted() {
        let at_limit = format!("a: {}", "b".repeat(MAX_SIZE_BYTES - 3));
        assert_eq!(at_limit.len(), MAX_SIZE_BYTES);
        assert!(!validate(&at_limit, &ConfigType::GenericYaml).has_code("FILE_TOO_LARGE"));
    }
}
