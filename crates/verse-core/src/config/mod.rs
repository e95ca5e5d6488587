//! Configuration loading for the verse reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. The file is grouped into tables
//! (`[logging]`, `[reader]`, `[insight]`, `[analysis]`, `[storage]`,
//! `[audio]`); any missing or invalid entry falls back to its default.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{AppConfig, LogLevel};
