//! Confgate CLI binary entry point.
//! Resolves configuration, installs logging, then delegates to the library
//! and prints results.

use clap::Parser;
use confgate::cli::{Cli, Commands, ConfigCmd, PolicyCmd, RuleCmd, VersionCmd};
use confgate::config::{self, Effective};
use confgate::diff::{self, BaseSelector};
use confgate::models::artifact::{Config, ConfigType, ConfigVersion};
use confgate::policy::{self, PolicySet};
use confgate::store::{MemoryStore, NewConfig, VersionStore};
use confgate::{dryrun, gate, output, utils, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    let g = &cli.global;
    let eff = config::resolve_effective(
        g.repo_root.as_deref(),
        g.output.as_deref(),
        g.store.as_deref(),
        None,
        g.project.as_deref(),
    );
    init_tracing(&eff);
    match run(cli.cmd, &eff) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e}", utils::error_prefix());
            std::process::exit(2);
        }
    }
}

/// `CONFGATE_LOG` wins over `[log] level`; logs always go to stderr.
fn init_tracing(eff: &Effective) {
    let filter = EnvFilter::try_from_env("CONFGATE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&eff.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if eff.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = installed {
        eprintln!("{} logging disabled: {e}", utils::note_prefix());
    }
}

fn run(cmd: Commands, eff: &Effective) -> Result<i32> {
    let out = eff.output.as_str();
    match cmd {
        Commands::Version { cmd: None } => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Version { cmd: Some(cmd) } => run_version(cmd, eff),
        Commands::Validate {
            patterns,
            config_type,
        } => {
            if !eff.config_found && !eff.json() {
                eprintln!(
                    "{} No confgate.toml found; using defaults.",
                    utils::note_prefix()
                );
            }
            let run = gate::run_validate(&eff.repo_root, &patterns, |p| {
                eff.type_for(config_type.as_deref(), p)
            })?;
            output::print_validate(&run, out);
            Ok(if run.failed() { 1 } else { 0 })
        }
        Commands::Rule {
            cmd: RuleCmd::Check { rule },
        } => {
            let check = policy::validate_rule_syntax(&rule);
            output::print_syntax_check(&check, out);
            Ok(if check.valid { 0 } else { 1 })
        }
        Commands::Rule {
            cmd: RuleCmd::Eval { rule, file },
        } => {
            let content = read_file(Path::new(&file))?;
            let eval = policy::check_and_evaluate(&rule, &content);
            output::print_rule_evaluation(&eval, out);
            Ok(if eval.passed { 0 } else { 1 })
        }
        Commands::Policy {
            cmd:
                PolicyCmd::Check {
                    file,
                    policies,
                    config_type,
                },
        } => {
            let policies_path = policies
                .map(PathBuf::from)
                .or_else(|| eff.policies.clone())
                .ok_or_else(|| {
                    Error::Usage(
                        "No policy file configured. Pass --policies or set `policies` in confgate.toml."
                            .to_string(),
                    )
                })?;
            let set = PolicySet::load(&policies_path)?;
            let path = Path::new(&file);
            let content = read_file(path)?;
            let ty = eff.type_for(config_type.as_deref(), path);
            let verdicts = set.evaluate(&content, eff.project.as_deref(), &ty);
            output::print_verdicts(&utils::rel_display(&eff.repo_root, path), &verdicts, out);
            Ok(if verdicts.iter().all(|v| v.passed) { 0 } else { 1 })
        }
        Commands::Config { cmd } => run_config(cmd, eff),
        Commands::Diff {
            title,
            version,
            base,
        } => {
            let store = MemoryStore::load(&eff.store)?;
            let config = find_config(&store, eff, &title)?;
            let target = select_version(&store, &config, version)?;
            let base = match base {
                None => BaseSelector::Previous,
                Some(n) => BaseSelector::Version(select_version(&store, &config, Some(n))?.id),
            };
            let result = diff::diff_versions(&store, target.id, base)?;
            output::print_diff(&result, out);
            Ok(0)
        }
        Commands::DryRun { title, version } => {
            let store = MemoryStore::load(&eff.store)?;
            let config = find_config(&store, eff, &title)?;
            let target = select_version(&store, &config, version)?;
            let report = dryrun::dry_run(&target.checksum, &config.config_type, &config.title)?;
            output::print_dry_run(&config.title, &target, &report, out);
            Ok(0)
        }
    }
}

fn run_config(cmd: ConfigCmd, eff: &Effective) -> Result<i32> {
    let out = eff.output.as_str();
    let store = MemoryStore::load(&eff.store)?;
    match cmd {
        ConfigCmd::Create {
            title,
            config_type,
            tags,
        } => {
            let config_type = ConfigType::from_tag(&config_type);
            let new = NewConfig::new(eff.store_project(), &title, config_type).with_tags(tags);
            let config = store.create_config(new)?;
            store.save(&eff.store)?;
            output::print_config(&config, "created:", out);
        }
        ConfigCmd::List => {
            output::print_configs(&store.list_configs(Some(eff.store_project())), out);
        }
        ConfigCmd::Delete { title } => {
            let config = find_config(&store, eff, &title)?;
            let removed = store.delete_config(config.id)?;
            store.save(&eff.store)?;
            output::print_config(&removed, "deleted:", out);
        }
    }
    Ok(0)
}

fn run_version(cmd: VersionCmd, eff: &Effective) -> Result<i32> {
    let out = eff.output.as_str();
    let store = MemoryStore::load(&eff.store)?;
    match cmd {
        VersionCmd::Add {
            title,
            file,
            author,
        } => {
            let config = find_config(&store, eff, &title)?;
            let content = read_file(Path::new(&file))?;
            let added = store.add_version(config.id, &content, &author)?;
            store.verify_consistency(config.id)?;
            store.save(&eff.store)?;
            output::print_added_version(&config.title, &added, out);
        }
        VersionCmd::List { title } => {
            let config = find_config(&store, eff, &title)?;
            let versions = store.list_versions(config.id)?;
            output::print_versions(&config.title, &versions, config.current_version_id, out);
        }
    }
    Ok(0)
}

fn find_config(store: &dyn VersionStore, eff: &Effective, title: &str) -> Result<Config> {
    store
        .find_config(eff.store_project(), title)
        .ok_or_else(|| Error::not_found("config", title))
}

/// An explicit version number, or the current version.
fn select_version(
    store: &dyn VersionStore,
    config: &Config,
    number: Option<u32>,
) -> Result<ConfigVersion> {
    match number {
        Some(n) => store
            .version_by_number(config.id, n)
            .ok_or_else(|| Error::not_found("version", format!("{} version_{n}", config.title))),
        None => store
            .current_version(config.id)
            .ok_or_else(|| Error::not_found("current version", config.title.clone())),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
