use crate::workspace::read_config;
use clap::{Subcommand, ValueEnum};
use meterline_core::timestamp::{format_timestamp, parse_timestamp};
use meterline_store::MeterPaths;
use std::path::Path;

/// Keys understood in `.meterline/config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ConfigKey {
    /// Anchor of the cumulative timeline (timestamp)
    ProjectStart,
    /// Job source, relative to the project root
    JobsPath,
}

impl ConfigKey {
    const ALL: [ConfigKey; 2] = [ConfigKey::ProjectStart, ConfigKey::JobsPath];

    fn name(self) -> &'static str {
        match self {
            ConfigKey::ProjectStart => "project_start",
            ConfigKey::JobsPath => "jobs_path",
        }
    }

    /// Canonical stored form of `raw`. Timestamps are stored normalized to UTC.
    fn canonicalize(self, raw: &str) -> anyhow::Result<String> {
        match self {
            ConfigKey::ProjectStart => parse_timestamp(raw)
                .map(format_timestamp)
                .ok_or_else(|| anyhow::anyhow!("project_start must be a timestamp, got {raw:?}")),
            ConfigKey::JobsPath if raw.trim().is_empty() => {
                anyhow::bail!("jobs_path must not be empty")
            }
            ConfigKey::JobsPath => Ok(raw.to_string()),
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set { key: ConfigKey, value: String },
    /// Print one config value
    Get { key: ConfigKey },
    /// Remove a config value, restoring its default
    Unset { key: ConfigKey },
    /// Print every key with its value
    List,
}

pub fn run(cmd: ConfigCmd, cwd: &Path) -> anyhow::Result<()> {
    let root = MeterPaths::find_root(cwd).ok_or_else(|| {
        anyhow::anyhow!("No .meterline/ workspace found. Run `meterline init` first.")
    })?;
    let paths = MeterPaths::discover(root);
    match cmd {
        ConfigCmd::Set { key, value } => {
            let stored = set(&paths, key, &value)?;
            println!("{} = {stored}", key.name());
        }
        ConfigCmd::Get { key } => {
            println!("{}", get(&paths, key)?.as_deref().unwrap_or("(not set)"));
        }
        ConfigCmd::Unset { key } => {
            if unset(&paths, key)? {
                println!("{} unset", key.name());
            }
        }
        ConfigCmd::List => {
            for key in ConfigKey::ALL {
                let value = get(&paths, key)?;
                println!("{} = {}", key.name(), value.as_deref().unwrap_or("(not set)"));
            }
        }
    }
    Ok(())
}

fn update(
    paths: &MeterPaths,
    f: impl FnOnce(&mut serde_json::Map<String, serde_json::Value>) -> bool,
) -> anyhow::Result<bool> {
    let mut config = read_config(&paths.config_json)?;
    if !f(&mut config) {
        return Ok(false);
    }
    let json = serde_json::to_string_pretty(&config)?;
    meterline_store::write_atomic(&paths.config_json, json.as_bytes())?;
    Ok(true)
}

/// Validate and store `value`; returns the stored form.
pub fn set(paths: &MeterPaths, key: ConfigKey, value: &str) -> anyhow::Result<String> {
    let stored = key.canonicalize(value)?;
    update(paths, |config| {
        config.insert(key.name().to_string(), stored.clone().into());
        true
    })?;
    Ok(stored)
}

pub fn get(paths: &MeterPaths, key: ConfigKey) -> anyhow::Result<Option<String>> {
    let config = read_config(&paths.config_json)?;
    Ok(config.get(key.name()).map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Returns whether the key was present.
pub fn unset(paths: &MeterPaths, key: ConfigKey) -> anyhow::Result<bool> {
    update(paths, |config| config.remove(key.name()).is_some())
}
