//! Core types for punchcard: domain model and configuration.
//!
//! This crate is dependency-light on purpose: everything that talks to the
//! network lives in `punchcard-slack` and `punchcard-tracker`.

pub mod config;
pub mod domain;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{ReportDraft, ReportKind, WorkItem};
