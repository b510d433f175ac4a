//! Confgate core library.
//!
//! This crate exposes programmatic APIs for validating infrastructure
//! configs, evaluating policy rules against them, and keeping an immutable,
//! checksummed version history with diffs and simulated dry-runs.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `validators`: Type-dispatched validators (Kubernetes, Terraform, generic YAML).
//! - `gate`: Parallel batch validation of globbed files.
//! - `policy`: Rule language parser/evaluator and policy sets.
//! - `store`: Version store contract and the in-memory JSON-backed store.
//! - `diff`: Unified diffs between versions.
//! - `dryrun`: Deterministic simulated apply.
//! - `models`: Reports, issues, configs, versions, and policy definitions.
//! - `output`: Human/JSON printers.
//! - `utils`: Supporting helpers.
//! - `error`: Crate error type.
pub mod cli;
pub mod config;
pub mod diff;
pub mod dryrun;
pub mod error;
pub mod gate;
pub mod models;
pub mod output;
pub mod policy;
pub mod store;
pub mod utils;
pub mod validators;

pub use error::{Error, Result};
