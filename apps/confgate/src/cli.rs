//! CLI argument parsing via `clap`.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "confgate",
    version,
    about = "Confgate: validate, police and version infrastructure configs",
    long_about = "Confgate validates Kubernetes, Terraform and generic YAML configs, evaluates policy rules against them, and keeps a checksummed version history with diffs and simulated dry-runs.\n\nConfiguration precedence: CLI > confgate.toml > defaults.",
    after_help = "Examples:\n  confgate validate 'k8s/**/*.yaml' --type K8S_YAML\n  confgate rule check \"NOT MATCHES(':\\s*latest\\b')\"\n  confgate policy check deploy.yaml --policies policies.toml --project infra\n  confgate version add web deploy.yaml --author alice\n  confgate diff web --version 3",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Default)]
/// Options shared by every subcommand.
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Repository root (default: current dir)")]
    pub repo_root: Option<String>,
    #[arg(long, global = true, help = "Output mode: human|json (default: human)")]
    pub output: Option<String>,
    #[arg(long, global = true, help = "Store snapshot path (default: .confgate/store.json)")]
    pub store: Option<String>,
    #[arg(long, global = true, help = "Project reference for scoping")]
    pub project: Option<String>,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version, or manage config versions
    #[command(
        about = "Show version or manage config versions",
        long_about = "Without a subcommand, print the confgate version. With `add` or `list`, manage the stored versions of a config."
    )]
    Version {
        #[command(subcommand)]
        cmd: Option<VersionCmd>,
    },
    /// Validate files
    #[command(
        about = "Validate config files",
        long_about = "Validate files matched by glob patterns in parallel. The type comes from --type, else `.tf` files are TERRAFORM, else the configured default_type. Exits 1 when any file FAILs.",
        after_help = "Examples:\n  confgate validate deploy.yaml --type K8S_YAML\n  confgate validate 'infra/*.tf' --output json"
    )]
    Validate {
        #[arg(required = true, help = "Files or glob patterns")]
        patterns: Vec<String>,
        #[arg(long = "type", help = "Config type: K8S_YAML|TERRAFORM|GENERIC_YAML")]
        config_type: Option<String>,
    },
    /// Policy rule authoring
    Rule {
        #[command(subcommand)]
        cmd: RuleCmd,
    },
    /// Policy set evaluation
    Policy {
        #[command(subcommand)]
        cmd: PolicyCmd,
    },
    /// Config management (create/list/delete)
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
    /// Diff two versions of a config
    #[command(
        about = "Diff config versions",
        long_about = "Unified diff of a config version (default: current) against a base version (default: the preceding one).",
        after_help = "Examples:\n  confgate diff web\n  confgate diff web --version 4 --base 1"
    )]
    Diff {
        title: String,
        #[arg(long, help = "Version number to inspect (default: current)")]
        version: Option<u32>,
        #[arg(long, help = "Base version number (default: previous)")]
        base: Option<u32>,
    },
    /// Simulate applying a config version
    #[command(
        about = "Simulated dry-run",
        long_about = "Report a deterministic, simulated plan for a config version. No infrastructure is contacted."
    )]
    DryRun {
        title: String,
        #[arg(long, help = "Version number (default: current)")]
        version: Option<u32>,
    },
}

#[derive(Subcommand)]
/// Subcommands for `confgate rule`
pub enum RuleCmd {
    /// Check rule syntax
    #[command(
        about = "Check rule syntax",
        long_about = "Parse a rule (including regex compilation) without evaluating it. Exits 1 when invalid."
    )]
    Check { rule: String },
    /// Evaluate a rule against a file
    #[command(
        about = "Evaluate rule",
        long_about = "Check rule syntax, then evaluate it against the file contents. Exits 1 unless the rule passes."
    )]
    Eval { rule: String, file: String },
}

#[derive(Subcommand)]
/// Subcommands for `confgate policy`
pub enum PolicyCmd {
    /// Evaluate every applicable policy against a file
    #[command(
        about = "Check file against policies",
        long_about = "Evaluate GLOBAL policies and the PROJECT policies of --project against a file. Exits 1 on any failed policy.",
        after_help = "Examples:\n  confgate policy check deploy.yaml --policies policies.toml --type K8S_YAML"
    )]
    Check {
        file: String,
        #[arg(long, help = "Policy file (default: `policies` from confgate.toml)")]
        policies: Option<String>,
        #[arg(long = "type", help = "Config type used for policy selection")]
        config_type: Option<String>,
    },
}

#[derive(Subcommand)]
/// Subcommands for `confgate config`
pub enum ConfigCmd {
    /// Create a config
    Create {
        #[arg(long)]
        title: String,
        #[arg(long = "type", help = "K8S_YAML|TERRAFORM|GENERIC_YAML")]
        config_type: String,
        #[arg(long = "tag", help = "Free-form tag (repeatable)")]
        tags: Vec<String>,
    },
    /// List configs of the project
    List,
    /// Delete a config and all of its versions
    Delete { title: String },
}

#[derive(Subcommand)]
/// Subcommands for `confgate version`
pub enum VersionCmd {
    /// Store file contents as a new version
    Add {
        title: String,
        file: String,
        #[arg(long, default_value = "cli", help = "Author recorded on the version")]
        author: String,
    },
    /// List versions of a config
    List { title: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_version_with_and_without_subcommand() {
        assert!(matches!(parse(&["confgate", "version"]).cmd, Commands::Version { cmd: None }));
        let cli = parse(&["confgate", "version", "add", "web", "d.yaml", "--author", "al"]);
        match cli.cmd {
            Commands::Version {
                cmd: Some(VersionCmd::Add { title, author, .. }),
            } => {
                assert_eq!(title, "web");
                assert_eq!(author, "al");
            }
            _ => panic!("unexpected parse"),
        }
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = parse(&[
            "confgate", "validate", "a.yaml", "--type", "K8S_YAML", "--output", "json",
        ]);
        assert_eq!(cli.global.output.as_deref(), Some("json"));
        match cli.cmd {
            Commands::Validate { patterns, config_type } => {
                assert_eq!(patterns, vec!["a.yaml"]);
                assert_eq!(config_type.as_deref(), Some("K8S_YAML"));
            }
            _ => panic!("unexpected parse"),
        }
    }

    #[test]
    fn test_config_create_repeatable_tags() {
        let cli = parse(&[
            "confgate", "config", "create", "--title", "web", "--type", "K8S_YAML", "--tag", "a",
            "--tag", "b", "--project", "infra",
        ]);
        assert_eq!(cli.global.project.as_deref(), Some("infra"));
        match cli.cmd {
            Commands::Config {
                cmd: ConfigCmd::Create { tags, .. },
            } => assert_eq!(tags, vec!["a", "b"]),
            _ => panic!("unexpected parse"),
        }
    }

    #[test]
    fn test_validate_requires_pattern() {
        assert!(Cli::try_parse_from(["confgate", "validate"]).is_err());
    }
}
