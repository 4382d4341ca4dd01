//! Configuration loading
//!
//! Settings come from a TOML file, by default
//! `~/.config/vibe-clock/config.toml` (or `$VIBE_CLOCK_CONFIG`), overlaid with
//! a few environment variables. A missing file means defaults.
//!
//! ```toml
//! [general]
//! default_days = 30
//!
//! [paths]
//! claude_code = "~/.claude"
//! codex = "~/.codex"
//! opencode = "~/.local/share/opencode"
//!
//! [agents]
//! enabled = ["claude_code", "codex", "opencode"]
//!
//! [privacy]
//! exclude_projects = ["*client-*"]
//! exclude_date_ranges = [["2024-12-24", "2024-12-26"]]
//!
//! [github]
//! gist_id = "abc123"
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::types::Source;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "VIBE_CLOCK_CONFIG";
/// Environment variable overriding `general.default_days`
pub const DAYS_ENV: &str = "VIBE_CLOCK_DAYS";
/// Environment variable overriding `github.gist_id`
pub const GIST_ID_ENV: &str = "VIBE_CLOCK_GIST_ID";
/// Environment variable used when the file has no token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

const DEFAULT_DAYS: u32 = 30;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub paths: PathsConfig,
    pub agents: AgentsConfig,
    pub privacy: PrivacyConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Length of the trailing aggregation window
    pub default_days: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_DAYS,
        }
    }
}

/// Per-source data roots; unset roots fall back to each reader's default
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub claude_code: Option<String>,
    pub codex: Option<String>,
    pub opencode: Option<String>,
}

impl PathsConfig {
    /// Configured root for `source`, with `~` expanded
    pub fn root_for(&self, source: Source) -> Option<PathBuf> {
        let raw = match source {
            Source::ClaudeCode => &self.claude_code,
            Source::Codex => &self.codex,
            Source::OpenCode => &self.opencode,
        };
        raw.as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(expand_tilde)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentsConfig {
    pub enabled: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: Source::ALL.iter().map(|s| s.as_str().to_string()).collect(),
        }
    }
}

impl AgentsConfig {
    /// Enabled sources in canonical order; unknown names are ignored
    pub fn enabled_sources(&self) -> Vec<Source> {
        let mut sources = Vec::new();
        for name in &self.enabled {
            match name.parse::<Source>() {
                Ok(source) if !sources.contains(&source) => sources.push(source),
                Ok(_) => {}
                Err(_) => warn!("Ignoring unsupported agent '{}' in config", name),
            }
        }
        sources.sort();
        sources
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Glob patterns matched against raw project labels
    pub exclude_projects: Vec<String>,
    /// Inclusive `[start, end]` local dates
    pub exclude_date_ranges: Vec<(NaiveDate, NaiveDate)>,
}

#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub gist_id: Option<String>,
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("gist_id", &self.gist_id)
            .finish()
    }
}

impl Config {
    /// Load from `explicit`, `$VIBE_CLOCK_CONFIG` or the default location,
    /// then apply environment overlays
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The file [`Config::load`] reads for `explicit`
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV)
            && !path.trim().is_empty()
        {
            return Ok(expand_tilde(&path));
        }
        dirs::home_dir()
            .map(|home| home.join(".config").join("vibe-clock").join("config.toml"))
            .ok_or_else(|| VibeclockError::Config("cannot determine home directory".to_string()))
    }

    /// Overlay environment values read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(days) = lookup(DAYS_ENV).filter(|d| !d.trim().is_empty()) {
            self.general.default_days = days.trim().parse().map_err(|_| {
                VibeclockError::Config(format!("{DAYS_ENV} must be a positive integer, got '{days}'"))
            })?;
        }
        if let Some(gist_id) = lookup(GIST_ID_ENV).filter(|g| !g.is_empty()) {
            self.github.gist_id = Some(gist_id);
        }
        if self.github.token.as_deref().is_none_or(str::is_empty)
            && let Some(token) = lookup(GITHUB_TOKEN_ENV).filter(|t| !t.is_empty())
        {
            self.github.token = Some(token);
        }
        Ok(())
    }

    /// Record `gist_id` under `[github]` in the file at `path`
    ///
    /// Works on the file as written, so other keys are preserved and values
    /// taken from the environment never reach disk. A missing file is
    /// created.
    pub fn save_gist_id(path: &Path, gist_id: &str) -> Result<()> {
        let mut document: toml::Table = if path.exists() {
            toml::from_str(&std::fs::read_to_string(path)?)?
        } else {
            toml::Table::new()
        };

        let github = document
            .entry("github")
            .or_insert(toml::Value::Table(toml::Table::new()));
        let toml::Value::Table(github) = github else {
            return Err(VibeclockError::Config(format!(
                "{}: `github` is not a table",
                path.display()
            )));
        };
        github.insert("gist_id".to_string(), toml::Value::String(gist_id.to_string()));

        let content = toml::to_string_pretty(&document)
            .map_err(|e| VibeclockError::Config(format!("cannot write config: {e}")))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        debug!("Saved gist id to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.default_days == 0 {
            return Err(VibeclockError::Config(
                "general.default_days must be at least 1".to_string(),
            ));
        }
        for (start, end) in &self.privacy.exclude_date_ranges {
            if start > end {
                return Err(VibeclockError::Config(format!(
                    "privacy.exclude_date_ranges entry [{start}, {end}] ends before it starts"
                )));
            }
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}
