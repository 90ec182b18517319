//! `pslint.toml` configuration.
//!
//! Looked up in order:
//!
//! | Source | Path |
//! |--------|------|
//! | `--config` | as given, must exist |
//! | Working directory | `./pslint.toml` |
//! | User config | `$XDG_CONFIG_HOME/pslint/config.toml` |
//!
//! The first file found is used; files are not layered. Command-line flags
//! override whatever the file says.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use pslint_engine::analysis::Analyzer;

use crate::args::{Args, Format};

/// File name looked up in the working directory.
pub const LOCAL_FILE: &str = "pslint.toml";

/// Contents of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Modules whose commands are available. Empty means all.
    pub modules: Vec<String>,
    /// Command manifests, relative to the config file.
    pub manifests: Vec<PathBuf>,
    /// Extra command names to treat as existing.
    pub extra_commands: Vec<String>,
    /// Seed the registry with host built-ins.
    pub builtins: bool,
    pub max_depth: Option<usize>,
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            manifests: Vec::new(),
            extra_commands: Vec::new(),
            builtins: true,
            max_depth: None,
            strict: false,
        }
    }
}

/// Effective settings after combining the config file with flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub modules: Vec<String>,
    pub manifests: Vec<PathBuf>,
    pub extra_commands: Vec<String>,
    pub builtins: bool,
    pub max_depth: usize,
    pub strict: bool,
    pub format: Format,
}

/// User config directory for pslint.
///
/// Uses `$XDG_CONFIG_HOME/pslint` or falls back to `~/.config/pslint`.
pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("pslint"))
}

impl Config {
    /// Parse TOML text. Relative manifest paths resolve against `base`.
    pub fn from_toml(text: &str, base: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        for manifest in &mut config.manifests {
            if manifest.is_relative() {
                *manifest = base.join(&*manifest);
            }
        }
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Find and load the configuration. Returns the default when none exists.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let candidates = std::iter::once(cwd.join(LOCAL_FILE))
            .chain(config_dir().map(|dir| dir.join("config.toml")));
        for candidate in candidates {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "using config file");
                return Ok((Self::load(&candidate)?, Some(candidate)));
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Apply command-line overrides.
    ///
    /// `--module` replaces the configured modules; manifests from both
    /// sources are used; `--strict` and `--no-builtins` can only tighten.
    pub fn apply(self, args: &Args) -> Settings {
        let modules = if args.modules.is_empty() {
            self.modules
        } else {
            args.modules.clone()
        };
        let mut manifests = self.manifests;
        manifests.extend(args.manifests.iter().cloned());

        Settings {
            modules,
            manifests,
            extra_commands: self.extra_commands,
            builtins: self.builtins && !args.no_builtins,
            max_depth: args
                .max_depth
                .or(self.max_depth)
                .unwrap_or(Analyzer::DEFAULT_MAX_DEPTH),
            strict: self.strict || args.strict,
            format: args.format,
        }
    }
}
