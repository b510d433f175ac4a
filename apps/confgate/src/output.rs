//! Output rendering for every command.
//!
//! Supports `human` (default) and `json` outputs. The JSON forms are built by
//! pure `compose_*` functions so their shape can be tested directly.

use crate::diff::{DiffResult, LineKind};
use crate::dryrun::DryRunReport;
use crate::gate::ValidateRun;
use crate::models::artifact::{Config, ConfigVersion};
use crate::models::{Issue, Level, Status};
use crate::policy::{PolicyVerdict, RuleEvaluation, SyntaxCheck};
use crate::store::AddedVersion;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && crate::utils::colors_enabled()
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{} {e}", crate::utils::error_prefix()),
    }
}

fn paint(text: &str, color: bool, style: fn(&str) -> String) -> String {
    if color {
        style(text)
    } else {
        text.to_string()
    }
}

fn level_tag(level: Level, color: bool) -> (String, String) {
    match level {
        Level::Error => (
            paint("✖", color, |s| s.red().to_string()),
            paint("⟦error⟧", color, |s| s.red().bold().to_string()),
        ),
        Level::Warn => (
            paint("▲", color, |s| s.yellow().to_string()),
            paint("⟦warn⟧", color, |s| s.yellow().bold().to_string()),
        ),
        Level::Info => (
            paint("◆", color, |s| s.blue().to_string()),
            paint("⟦info⟧", color, |s| s.blue().bold().to_string()),
        ),
    }
}

fn status_tag(status: Status, color: bool) -> String {
    let text = status.to_string();
    match status {
        Status::Pass => paint(&text, color, |s| s.green().bold().to_string()),
        Status::Warn => paint(&text, color, |s| s.yellow().bold().to_string()),
        Status::Fail => paint(&text, color, |s| s.red().bold().to_string()),
    }
}

fn issue_line(file: &str, issue: &Issue, color: bool) -> String {
    let (icon, sev) = level_tag(issue.level, color);
    let at = issue
        .path
        .as_deref()
        .map(|p| format!(" @ {p}"))
        .unwrap_or_default();
    format!("{icon} {sev} {file} ❲{}❳ {}{at}", issue.code, issue.message)
}

/// Print batch validation results.
pub fn print_validate(run: &ValidateRun, output: &str) {
    if output == "json" {
        print_json(&compose_validate_json(run));
        return;
    }
    let color = use_colors(output);
    for pattern in &run.unmatched {
        eprintln!("{} no files matched {pattern}", crate::utils::note_prefix());
    }
    for r in &run.reports {
        let file = paint(&r.file, color, |s| s.bold().to_string());
        println!("{} {} ({})", status_tag(r.report.status, color), file, r.config_type);
        for issue in &r.report.issues {
            println!("  {}", issue_line(&r.file, issue, color));
        }
    }
    let s = &run.summary;
    let summary = format!(
        "Summary: errors={} warnings={} infos={} files={} failed={}",
        s.errors, s.warnings, s.infos, s.files, s.failed
    );
    println!("{}", paint(&summary, color, |s| s.bold().to_string()));
}

/// Compose validation JSON object (pure) for testing/snapshot purposes.
pub fn compose_validate_json(run: &ValidateRun) -> JsonVal {
    json!({
        "results": run.reports,
        "unmatched": run.unmatched,
        "summary": run.summary,
    })
}

pub fn print_syntax_check(check: &SyntaxCheck, output: &str) {
    if output == "json" {
        print_json(check);
        return;
    }
    let color = use_colors(output);
    if check.valid {
        println!("{} {}", paint("✔", color, |s| s.green().to_string()), check.message);
    } else {
        println!(
            "{} {} {}",
            paint("✖", color, |s| s.red().to_string()),
            paint("invalid rule:", color, |s| s.red().bold().to_string()),
            check.message
        );
    }
}

pub fn print_rule_evaluation(eval: &RuleEvaluation, output: &str) {
    if output == "json" {
        print_json(eval);
        return;
    }
    let color = use_colors(output);
    let verdict = if eval.passed {
        paint("PASS", color, |s| s.green().bold().to_string())
    } else {
        paint("FAIL", color, |s| s.red().bold().to_string())
    };
    println!("{verdict} (valid={})", eval.valid);
    for m in &eval.messages {
        println!("  {m}");
    }
}

/// Print policy verdicts for one file.
pub fn print_verdicts(file: &str, verdicts: &[PolicyVerdict], output: &str) {
    if output == "json" {
        print_json(&compose_verdicts_json(file, verdicts));
        return;
    }
    let color = use_colors(output);
    if verdicts.is_empty() {
        eprintln!("{} no policies apply to {file}", crate::utils::note_prefix());
    }
    for v in verdicts {
        let mark = if v.passed {
            paint("✔", color, |s| s.green().to_string())
        } else {
            paint("✖", color, |s| s.red().to_string())
        };
        let name = paint(&v.name, color, |s| s.bold().to_string());
        println!("{mark} {name} ❲{}❳", v.rule);
        for m in &v.messages {
            println!("    {m}");
        }
    }
    let failed = verdicts.iter().filter(|v| !v.passed).count();
    let summary = format!(
        "Summary: policies={} passed={} failed={failed}",
        verdicts.len(),
        verdicts.len() - failed
    );
    println!("{}", paint(&summary, color, |s| s.bold().to_string()));
}

/// Compose policy verdict JSON object (pure) for testing/snapshot purposes.
pub fn compose_verdicts_json(file: &str, verdicts: &[PolicyVerdict]) -> JsonVal {
    let failed = verdicts.iter().filter(|v| !v.passed).count();
    json!({
        "file": file,
        "verdicts": verdicts,
        "summary": {
            "total": verdicts.len(),
            "passed": verdicts.len() - failed,
            "failed": failed,
        },
    })
}

fn config_line(c: &Config, color: bool) -> String {
    let tags = if c.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", c.tags.join(", "))
    };
    let current = c
        .current_version_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} ({}){tags} current={current}",
        paint(&c.title, color, |s| s.bold().to_string()),
        c.project_id,
        c.config_type
    )
}

pub fn print_config(config: &Config, action: &str, output: &str) {
    if output == "json" {
        print_json(config);
        return;
    }
    let color = use_colors(output);
    println!(
        "{} {}",
        paint(action, color, |s| s.green().bold().to_string()),
        config_line(config, color)
    );
}

pub fn print_configs(configs: &[Config], output: &str) {
    if output == "json" {
        print_json(configs);
        return;
    }
    let color = use_colors(output);
    for c in configs {
        println!("{}", config_line(c, color));
    }
}

pub fn print_added_version(title: &str, added: &AddedVersion, output: &str) {
    if output == "json" {
        print_json(added);
        return;
    }
    let color = use_colors(output);
    let v = &added.version;
    println!(
        "{} {title} {} sha256={}",
        paint("stored:", color, |s| s.green().bold().to_string()),
        v.label(),
        v.checksum
    );
    if let Some(n) = added.duplicate_of {
        eprintln!(
            "{} content is identical to version_{n}",
            crate::utils::note_prefix()
        );
    }
}

pub fn print_versions(
    title: &str,
    versions: &[ConfigVersion],
    current: Option<uuid::Uuid>,
    output: &str,
) {
    if output == "json" {
        print_json(&compose_versions_json(title, versions, current));
        return;
    }
    let color = use_colors(output);
    for v in versions.iter().rev() {
        let marker = if Some(v.id) == current { "*" } else { " " };
        println!(
            "{marker} {} {} {} by {}",
            paint(&v.label(), color, |s| s.bold().to_string()),
            &v.checksum[..v.checksum.len().min(12)],
            v.created_at.format("%Y-%m-%d %H:%M:%S"),
            v.created_by
        );
    }
}

/// Compose version history JSON (pure). Content is omitted; checksums
/// identify it.
pub fn compose_versions_json(
    title: &str,
    versions: &[ConfigVersion],
    current: Option<uuid::Uuid>,
) -> JsonVal {
    let items: Vec<_> = versions
        .iter()
        .map(|v| {
            json!({
                "id": v.id,
                "version_number": v.version_number,
                "checksum": v.checksum,
                "created_by": v.created_by,
                "created_at": v.created_at,
                "current": Some(v.id) == current,
            })
        })
        .collect();
    json!({"title": title, "versions": items})
}

pub fn print_diff(diff: &DiffResult, output: &str) {
    if output == "json" {
        print_json(diff);
        return;
    }
    let color = use_colors(output);
    if let Some(m) = &diff.message {
        println!("{}", paint(m, color, |s| s.bright_black().to_string()));
        return;
    }
    if diff.is_empty() {
        println!("{}", paint("no differences", color, |s| s.bright_black().to_string()));
        return;
    }
    if let (Some(base), Some(current)) = (diff.base_version, diff.current_version) {
        println!(
            "{} version_{base}",
            paint("---", color, |s| s.cyan().bold().to_string())
        );
        println!(
            "{} version_{current}",
            paint("+++", color, |s| s.cyan().bold().to_string())
        );
    }
    for hunk in &diff.hunks {
        println!("{}", paint(&hunk.header, color, |s| s.cyan().to_string()));
        for line in &hunk.lines {
            let rendered = line.render();
            let text = match line.kind {
                LineKind::Added => paint(&rendered, color, |s| s.green().to_string()),
                LineKind::Removed => paint(&rendered, color, |s| s.red().to_string()),
                LineKind::Context => rendered,
            };
            println!("{text}");
        }
    }
    println!(
        "{}",
        paint(
            &format!("+{} -{}", diff.added(), diff.removed()),
            color,
            |s| s.bold().to_string()
        )
    );
}

pub fn print_dry_run(title: &str, version: &ConfigVersion, report: &DryRunReport, output: &str) {
    if output == "json" {
        print_json(report);
        return;
    }
    let color = use_colors(output);
    println!(
        "{} {title} {}",
        paint("dry-run:", color, |s| s.cyan().bold().to_string()),
        version.label()
    );
    println!("  {}", report.summary);
    println!("  {}", report.diff_summary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileReport, Summary, ValidationReport};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_compose_validate_json_shape() {
        let reports = vec![FileReport {
            file: "k8s/app.yaml".into(),
            config_type: "K8S_YAML".into(),
            report: ValidationReport::from_issues(vec![
                Issue::error("MISSING_KIND", "Missing 'kind' field").at("document[0]")
            ]),
        }];
        let summary = Summary::from_reports(&reports);
        let run = ValidateRun {
            reports,
            unmatched: vec!["none/*.tf".into()],
            summary,
        };
        let out = compose_validate_json(&run);
        assert_eq!(out["results"][0]["file"], "k8s/app.yaml");
        assert_eq!(out["results"][0]["type"], "K8S_YAML");
        assert_eq!(out["results"][0]["status"], "FAIL");
        assert_eq!(out["results"][0]["issues"][0]["level"], "ERROR");
        assert_eq!(out["results"][0]["issues"][0]["path"], "document[0]");
        assert_eq!(out["summary"]["errors"], 1);
        assert_eq!(out["summary"]["failed"], 1);
        assert_eq!(out["unmatched"][0], "none/*.tf");
    }

    #[test]
    fn test_compose_verdicts_json_counts() {
        let verdicts = vec![
            PolicyVerdict {
                name: "owner".into(),
                rule: "INCLUDES('owner')".into(),
                passed: true,
                messages: vec![],
            },
            PolicyVerdict {
                name: "no-latest".into(),
                rule: "NOT INCLUDES('latest')".into(),
                passed: false,
                messages: vec!["Policy rule failed".into()],
            },
        ];
        let out = compose_verdicts_json("deploy.yaml", &verdicts);
        assert_eq!(out["summary"]["total"], 2);
        assert_eq!(out["summary"]["failed"], 1);
        assert_eq!(out["verdicts"][1]["messages"][0], "Policy rule failed");
    }

    #[test]
    fn test_compose_versions_json_marks_current() {
        let config_id = Uuid::new_v4();
        let mk = |n: u32| ConfigVersion {
            id: Uuid::new_v4(),
            config_id,
            version_number: n,
            content: format!("v: {n}\n"),
            checksum: crate::models::artifact::checksum(&format!("v: {n}\n")),
            created_by: "alice".into(),
            created_at: Utc::now(),
        };
        let versions = vec![mk(1), mk(2)];
        let out = compose_versions_json("web", &versions, Some(versions[1].id));
        assert_eq!(out["title"], "web");
        assert_eq!(out["versions"][0]["current"], false);
        assert_eq!(out["versions"][1]["current"], true);
        assert_eq!(out["versions"][1]["version_number"], 2);
        assert!(out["versions"][0].get("content").is_none());
    }
}
