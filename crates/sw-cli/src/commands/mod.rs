//! Command handler modules for sw-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod ingest;
pub mod report;

use anyhow::{Context, Result};
use std::path::Path;
use sw_config::{EngineConfig, LoadedConfig, UnusedKeyPolicy};
use sw_sources::ingest_csv::{self, DataDir};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Layered config from `paths`, or the built-in defaults when empty.
/// Unused keys are printed as warnings, not errors.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, EngineConfig)> {
    let loaded = if paths.is_empty() {
        sw_config::load_layered_yaml_from_strings(&[])?
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        sw_config::load_layered_yaml(&refs)?
    };

    let unused = sw_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        eprintln!("WARN: unused config key {ptr}");
    }

    let cfg = EngineConfig::from_config_json(&loaded.config_json)?;
    Ok((loaded, cfg))
}

pub fn load_csv_dir(dir: &Path) -> Result<DataDir> {
    ingest_csv::load_data_dir(dir)
        .with_context(|| format!("failed to load data dir: {}", dir.display()))
}
