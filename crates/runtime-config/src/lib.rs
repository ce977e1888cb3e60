//! Configuration types for gitmigrate.
//!
//! The CLI reads `gitmigrate.toml` into [`MigrateConfig`]; command-line flags
//! are applied on top of the loaded values by the CLI itself.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "gitmigrate.toml";

/// Top-level configuration (persisted as `gitmigrate.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MigrateConfig {
    #[serde(default)]
    pub git: GitSettings,
    #[serde(default)]
    pub push: PushSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitSettings {
    /// Executable used for every git call.
    #[serde(default = "default_git_command")]
    pub command: String,
    /// Pinned into `LANG` and `LC_ALL` so git output is never translated.
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            command: default_git_command(),
            locale: default_locale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Maximum commits per push; 0 pushes everything in one call.
    #[serde(default)]
    pub batch_size: usize,
    /// Branch names pushed and reported before all others.
    #[serde(default = "default_branch_names")]
    pub default_branches: Vec<String>,
    #[serde(default = "default_false")]
    pub ignore_failures: bool,
    #[serde(default = "default_false")]
    pub ignore_missing_credential_helper: bool,
    /// Let pushes use the terminal, e.g. for password prompts.
    #[serde(default = "default_false")]
    pub interactive: bool,
    /// Remote branch prefix `git svn` was configured with.
    #[serde(default = "default_svn_prefix")]
    pub svn_prefix: String,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            batch_size: 0,
            default_branches: default_branch_names(),
            ignore_failures: false,
            ignore_missing_credential_helper: false,
            interactive: false,
            svn_prefix: default_svn_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Sleep between polls of a streamed child's output.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stdout_level")]
    pub stdout_level: LogLevel,
    #[serde(default = "default_stderr_level")]
    pub stderr_level: LogLevel,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stdout_level: default_stdout_level(),
            stderr_level: default_stderr_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_false() -> bool {
    false
}
fn default_git_command() -> String {
    "git".to_string()
}
fn default_locale() -> String {
    "C".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_svn_prefix() -> String {
    "svn/".to_string()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_stdout_level() -> LogLevel {
    LogLevel::Info
}
fn default_stderr_level() -> LogLevel {
    LogLevel::Warn
}

pub const DEFAULT_BRANCH_NAMES: &[&str] = &["trunk", "main", "master"];

pub fn default_branch_names() -> Vec<String> {
    DEFAULT_BRANCH_NAMES
        .iter()
        .map(|name| (*name).to_string())
        .collect()
}

/// Repair values a hand-edited file can leave unusable.
/// Returns true when any field was updated.
pub fn apply_fallbacks(config: &mut MigrateConfig) -> bool {
    let mut changed = false;

    if config.git.command.trim().is_empty() {
        config.git.command = default_git_command();
        changed = true;
    }
    if config.git.locale.trim().is_empty() {
        config.git.locale = default_locale();
        changed = true;
    }
    if config.push.remote.trim().is_empty() {
        config.push.remote = default_remote();
        changed = true;
    }
    if config.push.default_branches.is_empty() {
        config.push.default_branches = default_branch_names();
        changed = true;
    }
    if !config.push.svn_prefix.is_empty() && !config.push.svn_prefix.ends_with('/') {
        config.push.svn_prefix.push('/');
        changed = true;
    }
    if config.monitor.poll_interval_ms == 0 {
        config.monitor.poll_interval_ms = default_poll_interval_ms();
        changed = true;
    }

    changed
}
