//! Threat model report builder
//!
//! Loads a hierarchy of YAML/JSON threat model documents into a typed graph,
//! renders numbered markdown/HTML reports and emits attack tree diagram sources.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
