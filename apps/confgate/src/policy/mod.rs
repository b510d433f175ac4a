//! Policy rule engine.
//!
//! Rules are validated once when authored ([`validate_rule_syntax`],
//! [`Rule::parse`], [`PolicySet::from_rules`]) and evaluated many times.
//! Evaluation entry points never fail: a rule that does not parse becomes a
//! failed verdict with a diagnostic, so one bad policy cannot abort a batch.

pub mod expr;

use crate::error::{Error, Result};
use crate::models::artifact::ConfigType;
use crate::models::policy::{PolicyFile, PolicyRule};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

pub use expr::{Expr, RuleError};

/// Message attached to a rule that evaluated to false.
pub const FAILED_MESSAGE: &str = "Policy rule failed";

/// A parsed rule ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    expr: Expr,
}

impl Rule {
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let expr = expr::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn matches(&self, content: &str) -> bool {
        self.expr.evaluate(content)
    }

    pub fn outcome(&self, content: &str) -> PolicyOutcome {
        PolicyOutcome::from_verdict(self.matches(content))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Result of an authoring-time syntax check.
pub struct SyntaxCheck {
    pub valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Result of evaluating a rule against content.
pub struct PolicyOutcome {
    pub passed: bool,
    pub messages: Vec<String>,
}

impl PolicyOutcome {
    fn from_verdict(passed: bool) -> Self {
        Self {
            passed,
            messages: if passed {
                Vec::new()
            } else {
                vec![FAILED_MESSAGE.to_string()]
            },
        }
    }

    fn evaluation_error(err: &RuleError) -> Self {
        Self {
            passed: false,
            messages: vec![format!("Error evaluating policy: {err}")],
        }
    }
}

/// Check rule shape, including regex compilation, without evaluating.
pub fn validate_rule_syntax(rule: &str) -> SyntaxCheck {
    match expr::parse(rule) {
        Ok(_) => SyntaxCheck {
            valid: true,
            message: "Rule syntax is valid".to_string(),
        },
        Err(e) => SyntaxCheck {
            valid: false,
            message: e.to_string(),
        },
    }
}

/// Parse and evaluate `rule` against `content` in one step.
pub fn evaluate(rule: &str, content: &str) -> PolicyOutcome {
    match Rule::parse(rule) {
        Ok(r) => r.outcome(content),
        Err(e) => {
            tracing::warn!(error = %e, "policy rule failed to parse during evaluation");
            PolicyOutcome::evaluation_error(&e)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Combined syntax check and evaluation of an ad-hoc rule.
pub struct RuleEvaluation {
    pub valid: bool,
    pub passed: bool,
    pub messages: Vec<String>,
}

/// Check `rule` first; only a valid rule is evaluated against `content`.
pub fn check_and_evaluate(rule: &str, content: &str) -> RuleEvaluation {
    match Rule::parse(rule) {
        Ok(r) => {
            let outcome = r.outcome(content);
            RuleEvaluation {
                valid: true,
                passed: outcome.passed,
                messages: outcome.messages,
            }
        }
        Err(e) => RuleEvaluation {
            valid: false,
            passed: false,
            messages: vec![format!("Invalid rule syntax: {e}")],
        },
    }
}

#[derive(Debug, Clone, Serialize)]
/// Verdict of one named policy in a batch.
pub struct PolicyVerdict {
    pub name: String,
    pub rule: String,
    pub passed: bool,
    pub messages: Vec<String>,
}

/// Policies whose rules passed the authoring-time syntax check.
#[derive(Debug, Default)]
pub struct PolicySet {
    entries: Vec<(PolicyRule, Rule)>,
}

impl PolicySet {
    /// Compile every policy; the first invalid rule rejects the set.
    pub fn from_rules(policies: Vec<PolicyRule>) -> Result<Self> {
        let mut entries = Vec::with_capacity(policies.len());
        for p in policies {
            if p.scope == crate::models::policy::PolicyScope::Project && p.project.is_none() {
                return Err(Error::InvalidPolicy {
                    name: p.name,
                    reason: "project is required for PROJECT scope".to_string(),
                });
            }
            let rule = Rule::parse(&p.rule).map_err(|e| Error::InvalidPolicy {
                name: p.name.clone(),
                reason: format!("Invalid rule syntax: {e}"),
            })?;
            entries.push((p, rule));
        }
        Ok(Self { entries })
    }

    /// Load a TOML policy file (`[[policies]]` entries).
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: PolicyFile = toml::from_str(&text).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        let set = Self::from_rules(file.policies)?;
        tracing::debug!(path = %path.display(), policies = set.len(), "loaded policy set");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policies(&self) -> impl Iterator<Item = &PolicyRule> {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Evaluate every policy selected for `project` / `config_type` against
    /// `content`. Verdicts keep file order.
    pub fn evaluate(
        &self,
        content: &str,
        project: Option<&str>,
        config_type: &ConfigType,
    ) -> Vec<PolicyVerdict> {
        self.entries
            .par_iter()
            .filter(|(p, _)| p.applies_to(project, config_type))
            .map(|(p, rule)| {
                let outcome = rule.outcome(content);
                PolicyVerdict {
                    name: p.name.clone(),
                    rule: p.rule.clone(),
                    passed: outcome.passed,
                    messages: outcome.messages,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::policy::PolicyScope;

    #[test]
    fn test_includes_owner() {
        assert!(evaluate("INCLUDES('owner')", "owner: team-x").passed);
        let out = evaluate("INCLUDES('owner')", "team: x");
        assert!(!out.passed);
        assert_eq!(out.messages, vec![FAILED_MESSAGE.to_string()]);
    }

    #[test]
    fn test_not_matches_latest() {
        let rule = r"NOT MATCHES(':\s*latest\b')";
        assert!(!evaluate(rule, "image: app:latest").passed);
        assert!(evaluate(rule, "image: app:1.2.3").passed);
        assert!(evaluate(rule, "image: app:1.2.3").messages.is_empty());
    }

    #[test]
    fn test_matches_is_search_not_full_match() {
        assert!(evaluate("MATCHES('replicas:\\s*[2-9]')", "kind: X\nreplicas: 3\n").passed);
    }

    #[test]
    fn test_syntax_invalid_regex() {
        let check = validate_rule_syntax("INCLUDES('a') AND MATCHES('[')");
        assert!(!check.valid);
        assert!(check.message.contains("Invalid regex pattern"));
        assert!(validate_rule_syntax("INCLUDES('a') AND MATCHES('[a-z]')").valid);
    }

    #[test]
    fn test_evaluation_error_becomes_failed_outcome() {
        let out = evaluate("REQUIRES('x')", "x");
        assert!(!out.passed);
        assert!(out.messages[0].starts_with("Error evaluating policy:"));
    }

    #[test]
    fn test_check_and_evaluate() {
        let ok = check_and_evaluate("INCLUDES('owner')", "owner: a");
        assert!(ok.valid && ok.passed && ok.messages.is_empty());
        let failed = check_and_evaluate("INCLUDES('owner')", "team: a");
        assert!(failed.valid && !failed.passed);
        let bad = check_and_evaluate("INCLUDES(owner)", "owner: a");
        assert!(!bad.valid && !bad.passed);
        assert!(bad.messages[0].starts_with("Invalid rule syntax:"));
    }

    #[test]
    fn test_policy_set_rejects_invalid_rule_at_load() {
        let err = PolicySet::from_rules(vec![PolicyRule {
            name: "broken".into(),
            scope: PolicyScope::Global,
            project: None,
            config_type: None,
            rule: "MATCHES('(')".into(),
            description: None,
        }])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_policy_set_selects_and_keeps_order() {
        let mk = |name: &str,
                  scope,
                  project: Option<&str>,
                  ty: Option<ConfigType>,
                  rule: &str| PolicyRule {
            name: name.into(),
            scope,
            project: project.map(str::to_string),
            config_type: ty,
            rule: rule.into(),
            description: None,
        };
        let set = PolicySet::from_rules(vec![
            mk("owner", PolicyScope::Global, None, None, "INCLUDES('owner')"),
            mk(
                "tf-only",
                PolicyScope::Global,
                None,
                Some(ConfigType::Terraform),
                "INCLUDES('provider')",
            ),
            mk("infra", PolicyScope::Project, Some("infra"), None, "NOT INCLUDES('latest')"),
            mk("web", PolicyScope::Project, Some("web"), None, "INCLUDES('web')"),
        ])
        .unwrap();
        let verdicts = set.evaluate(
            "owner: a\nimage: app:latest",
            Some("infra"),
            &ConfigType::K8sYaml,
        );
        let names: Vec<_> = verdicts.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "infra"]);
        assert!(verdicts[0].passed);
        assert!(!verdicts[1].passed);
    }

    #[test]
    fn test_project_scope_without_project_rejected() {
        let err = PolicySet::from_rules(vec![PolicyRule {
            name: "orphan".into(),
            scope: PolicyScope::Project,
            project: None,
            config_type: None,
            rule: "INCLUDES('a')".into(),
            description: None,
        }])
        .unwrap_err();
        assert!(err.to_string().contains("PROJECT scope"));
    }

    #[test]
    fn test_load_policy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.toml");
        fs::write(
            &path,
            "[[policies]]\nname = \"no-latest\"\nrule = \"NOT MATCHES(':\\\\s*latest')\"\n",
        )
        .unwrap();
        let set = PolicySet::load(&path).unwrap();
        assert_eq!(set.len(), 1);
        let v = set.evaluate("image: a:latest", None, &ConfigType::K8sYaml);
        assert!(!v[0].passed);
    }
}
