//! Kubernetes manifest checks over a multi-document YAML stream.

use super::{invalid_yaml, join_key, oversized, untag};
use crate::models::{Issue, ValidationReport};
use serde::Deserialize;
use serde_yaml::Value as Yaml;

/// Kinds whose pod template carries containers.
const WORKLOAD_KINDS: [&str; 6] = [
    "Deployment",
    "Pod",
    "StatefulSet",
    "DaemonSet",
    "Job",
    "CronJob",
];

/// Validate every non-empty document in a Kubernetes YAML stream.
///
/// Per document: `apiVersion`, `kind` and `metadata.name` are required.
/// Workload containers must pin an image tag other than `latest` and
/// should declare resource requests and limits. Deployments should run at
/// least two replicas.
pub fn validate_k8s_yaml(content: &str) -> ValidationReport {
    if let Some(report) = oversized(content) {
        return report;
    }
    let docs = match parse_stream(content) {
        Ok(d) => d,
        Err(e) => return invalid_yaml(&e),
    };

    let mut issues = Vec::new();
    for (idx, doc) in docs.iter().enumerate() {
        let doc = untag(doc);
        if is_blank(Some(doc)) {
            continue;
        }
        let doc_path = format!("document[{idx}]");
        if !doc.is_mapping() {
            issues.push(
                Issue::error("INVALID_DOCUMENT", "Kubernetes document must be a mapping")
                    .at(doc_path),
            );
            continue;
        }
        check_document(doc, &doc_path, &mut issues);
    }
    ValidationReport::from_issues(issues)
}

fn parse_stream(content: &str) -> Result<Vec<Yaml>, serde_yaml::Error> {
    serde_yaml::Deserializer::from_str(content)
        .map(Yaml::deserialize)
        .collect()
}

fn check_document(doc: &Yaml, doc_path: &str, issues: &mut Vec<Issue>) {
    if doc.get("apiVersion").is_none() {
        issues.push(Issue::error("MISSING_API_VERSION", "Missing 'apiVersion' field").at(doc_path));
    }
    if doc.get("kind").is_none() {
        issues.push(Issue::error("MISSING_KIND", "Missing 'kind' field").at(doc_path));
    }
    if lookup(doc, &["metadata", "name"]).is_none() {
        issues.push(
            Issue::error("MISSING_METADATA_NAME", "Missing 'metadata.name' field").at(doc_path),
        );
    }

    let kind = doc.get("kind").and_then(Yaml::as_str).unwrap_or("");
    if !WORKLOAD_KINDS.contains(&kind) {
        return;
    }

    let segments = container_segments(kind);
    let containers_path = join_key(doc_path, &segments.join("."));
    if let Some(Yaml::Sequence(containers)) = lookup(doc, segments) {
        for (cidx, container) in containers.iter().enumerate() {
            check_container(untag(container), &format!("{containers_path}[{cidx}]"), issues);
        }
    }

    if kind == "Deployment" {
        let replicas = match lookup(doc, &["spec", "replicas"]) {
            None | Some(Yaml::Null) => Some(1),
            Some(v) => v.as_i64(),
        };
        if let Some(n) = replicas.filter(|n| *n < 2) {
            issues.push(
                Issue::warn(
                    "LOW_REPLICA_COUNT",
                    format!(
                        "Deployment has {n} replica(s). Consider using >= 2 for high availability"
                    ),
                )
                .at(format!("{doc_path}.spec.replicas")),
            );
        }
    }
}

/// Where each workload kind keeps its container list.
fn container_segments(kind: &str) -> &'static [&'static str] {
    match kind {
        "Pod" => &["spec", "containers"],
        "CronJob" => &[
            "spec",
            "jobTemplate",
            "spec",
            "template",
            "spec",
            "containers",
        ],
        _ => &["spec", "template", "spec", "containers"],
    }
}

fn check_container(container: &Yaml, path: &str, issues: &mut Vec<Issue>) {
    let name = container
        .get("name")
        .and_then(Yaml::as_str)
        .unwrap_or("unknown");
    let image = container.get("image").and_then(Yaml::as_str).unwrap_or("");
    if !has_pinned_tag(image) {
        issues.push(
            Issue::error(
                "LATEST_TAG_DISALLOWED",
                format!("Container image should not use ':latest' tag: {image}"),
            )
            .at(format!("{path}.image")),
        );
    }

    let resources = container.get("resources").map(untag);
    if is_blank(resources.and_then(|r| r.get("requests"))) {
        issues.push(
            Issue::warn(
                "MISSING_RESOURCE_REQUESTS",
                format!("Container '{name}' missing resource requests"),
            )
            .at(format!("{path}.resources")),
        );
    }
    if is_blank(resources.and_then(|r| r.get("limits"))) {
        issues.push(
            Issue::warn(
                "MISSING_RESOURCE_LIMITS",
                format!("Container '{name}' missing resource limits"),
            )
            .at(format!("{path}.resources")),
        );
    }
}

/// True when the image names an explicit tag other than `latest`, or is
/// pinned by digest. A `:` inside the registry host (`host:5000/app`) is
/// not a tag.
fn has_pinned_tag(image: &str) -> bool {
    let (name, digest) = match image.split_once('@') {
        Some((n, d)) => (n, Some(d)),
        None => (image, None),
    };
    let last = name.rsplit('/').next().unwrap_or(name);
    match last.rsplit_once(':') {
        Some((_, "latest")) => false,
        Some((_, tag)) if !tag.is_empty() => true,
        _ => digest.is_some_and(|d| !d.is_empty()),
    }
}

fn lookup<'a>(root: &'a Yaml, segments: &[&str]) -> Option<&'a Yaml> {
    segments
        .iter()
        .try_fold(root, |cur, seg| untag(cur).get(*seg))
        .map(untag)
}

/// Absent, null, or an empty collection/string.
fn is_blank(v: Option<&Yaml>) -> bool {
    match v.map(untag) {
        None | Some(Yaml::Null) => true,
        Some(Yaml::Mapping(m)) => m.is_empty(),
        Some(Yaml::Sequence(s)) => s.is_empty(),
        Some(Yaml::String(s)) => s.is_empty(),
        Some(Yaml::Bool(b)) => !b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Level, Status};

    const GOOD_DEPLOYMENT: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 3
  template:
    spec:
      containers:
        - name: app
          image: registry.local:5000/app:1.4.2
          resources:
            requests: {cpu: 100m}
            limits: {cpu: 500m}
";

    fn codes(r: &ValidationReport) -> Vec<&str> {
        r.issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn test_well_formed_deployment_passes() {
        let r = validate_k8s_yaml(GOOD_DEPLOYMENT);
        assert_eq!(r.status, Status::Pass, "{:?}", r.issues);
    }

    #[test]
    fn test_latest_deployment_without_resources_fails() {
        let src = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  template:
    spec:
      containers:
        - name: app
          image: app:latest
";
        let r = validate_k8s_yaml(src);
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.count(Level::Error), 1);
        assert_eq!(
            codes(&r),
            vec![
                "LATEST_TAG_DISALLOWED",
                "MISSING_RESOURCE_REQUESTS",
                "MISSING_RESOURCE_LIMITS",
                "LOW_REPLICA_COUNT"
            ]
        );
        assert_eq!(
            r.issues[0].path.as_deref(),
            Some("document[0].spec.template.spec.containers[0].image")
        );
    }

    #[test]
    fn test_missing_required_fields_per_document() {
        let src = "kind: ConfigMap\n---\n---\napiVersion: v1\nmetadata: {}\n";
        let r = validate_k8s_yaml(src);
        assert_eq!(
            codes(&r),
            vec![
                "MISSING_API_VERSION",
                "MISSING_METADATA_NAME",
                "MISSING_KIND",
                "MISSING_METADATA_NAME"
            ]
        );
        // the empty middle document is skipped but still counts for indexing
        assert_eq!(r.issues[2].path.as_deref(), Some("document[2]"));
    }

    #[test]
    fn test_pod_and_cronjob_container_locations() {
        let pod = "\
apiVersion: v1
kind: Pod
metadata: {name: p}
spec:
  containers:
    - name: c
      image: busybox
";
        let r = validate_k8s_yaml(pod);
        assert_eq!(
            r.issues[0].path.as_deref(),
            Some("document[0].spec.containers[0].image")
        );

        let cron = "\
apiVersion: batch/v1
kind: CronJob
metadata: {name: nightly}
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
            - name: job
              image: tool:2.0
              resources:
                requests: {memory: 64Mi}
";
        let r = validate_k8s_yaml(cron);
        assert_eq!(codes(&r), vec!["MISSING_RESOURCE_LIMITS"]);
        assert_eq!(r.status, Status::Warn);
    }

    #[test]
    fn test_template_workloads_use_pod_template_containers() {
        for kind in ["StatefulSet", "DaemonSet", "Job"] {
            let src = format!(
                "\
apiVersion: apps/v1
kind: {kind}
metadata: {{name: w}}
spec:
  template:
    spec:
      containers:
        - name: ok
          image: app:1.0
          resources:
            requests: {{cpu: 100m}}
            limits: {{cpu: 200m}}
        - name: bad
          image: app:latest
          resources:
            requests: {{cpu: 100m}}
            limits: {{cpu: 200m}}
"
            );
            let r = validate_k8s_yaml(&src);
            // replica checks apply to Deployments only
            assert_eq!(codes(&r), vec!["LATEST_TAG_DISALLOWED"], "{kind}");
            assert_eq!(
                r.issues[0].path.as_deref(),
                Some("document[0].spec.template.spec.containers[1].image"),
                "{kind}"
            );
        }
    }

    #[test]
    fn test_missing_replicas_defaults_to_one() {
        let src = GOOD_DEPLOYMENT.replace("  replicas: 3\n", "");
        let r = validate_k8s_yaml(&src);
        assert_eq!(codes(&r), vec!["LOW_REPLICA_COUNT"]);
        assert!(r.issues[0].message.contains("has 1 replica"));
    }

    #[test]
    fn test_non_workload_kinds_skip_container_checks() {
        let src = "apiVersion: v1\nkind: Service\nmetadata: {name: s}\nspec: {}\n";
        assert_eq!(validate_k8s_yaml(src).status, Status::Pass);
    }

    #[test]
    fn test_non_mapping_document_reported() {
        let r = validate_k8s_yaml("- a\n- b\n");
        assert_eq!(codes(&r), vec!["INVALID_DOCUMENT"]);
    }

    #[test]
    fn test_stream_parse_error_is_single_issue() {
        let r = validate_k8s_yaml("apiVersion: v1\n---\nkind: [Pod\n");
        assert_eq!(codes(&r), vec!["INVALID_YAML"]);
    }

    #[test]
    fn test_image_tag_pinning() {
        assert!(has_pinned_tag("nginx:1.25"));
        assert!(has_pinned_tag("ghcr.io/org/app@sha256:abcd"));
        assert!(!has_pinned_tag("nginx"));
        assert!(!has_pinned_tag("nginx:latest"));
        assert!(!has_pinned_tag("registry:5000/nginx"));
        assert!(!has_pinned_tag("nginx:latest@sha256:abcd"));
        assert!(!has_pinned_tag(""));
    }
}
