use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::sema::placeholder::DEFAULT_MARKER;

pub const CONFIG_FILE: &str = "tsgen.toml";
pub const CONFIG_ENV: &str = "TSGEN_CONFIG";

/// Settings read from `tsgen.toml`. Command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Package whose `main` (or tests) roots the call graph.
    pub main: Option<String>,
    /// Comment prefix that marks a declared type as a type variable.
    pub marker: Option<String>,
    pub verbose: bool,
    /// Rewrite files in place instead of printing them.
    pub write: bool,
}

impl Config {
    pub fn parse(toml_text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str::<Config>(toml_text)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Config::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// `explicit`, else `$TSGEN_CONFIG`, else the nearest `tsgen.toml` above
    /// `start`. No file at all yields the defaults.
    pub fn discover(explicit: Option<&Path>, start: &Path) -> anyhow::Result<(Config, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
                _ => find_config(start),
            },
        };
        match path {
            Some(path) => Ok((Config::load(&path)?, Some(path))),
            None => Ok((Config::default(), None)),
        }
    }

    pub fn marker(&self) -> &str {
        self.marker.as_deref().unwrap_or(DEFAULT_MARKER)
    }
}

fn find_config(start: &Path) -> Option<PathBuf> {
    let mut p = if start.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        start.to_path_buf()
    };
    if let Ok(abs) = p.canonicalize() {
        p = abs;
    }
    loop {
        let candidate = p.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !p.pop() {
            break;
        }
    }
    None
}
