use anyhow::{bail, Context, Result};
use gitmigrate_git::Git;
use gitmigrate_process::{Environment, ProcessRunner, TaskMonitor};
use gitmigrate_runtime_config::{apply_fallbacks, LogLevel, MigrateConfig, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::output::{print_json, OutputFormat};

/// Get the config directory path (~/.config/gitmigrate/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("gitmigrate"))
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<MigrateConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let mut config: MigrateConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    if apply_fallbacks(&mut config) {
        warn!("{} has blank values, using defaults for them", path.display());
    }
    Ok(config)
}

/// Everything a subcommand needs: resolved config and where to run git.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: MigrateConfig,
    /// File the config came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

impl AppContext {
    /// An explicit `--config` file must exist; the default one is optional.
    pub fn load(explicit: Option<&Path>, dir: Option<PathBuf>) -> Result<Self> {
        let (config, source) = match explicit {
            Some(path) => (read_config(path)?, Some(path.to_path_buf())),
            None => {
                let path = config_path()?;
                if path.exists() {
                    (read_config(&path)?, Some(path))
                } else {
                    debug!("no config at {}, using defaults", path.display());
                    (MigrateConfig::default(), None)
                }
            }
        };
        if let Some(dir) = &dir {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
        }
        Ok(Self {
            config,
            source,
            dir,
        })
    }

    /// The process environment, captured once, with the locale pinned.
    pub fn environment(&self) -> Environment {
        Environment::inherited().with_locale(&self.config.git.locale)
    }

    pub fn monitor(&self) -> TaskMonitor {
        let settings = &self.config.monitor;
        TaskMonitor {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            stdout_level: tracing_level(settings.stdout_level),
            stderr_level: tracing_level(settings.stderr_level),
            merge_stderr: false,
        }
    }

    /// A git wrapper running in `-C <dir>` (or the current directory) with `env`.
    pub fn git(&self, env: Environment) -> Git {
        let mut runner = ProcessRunner::new(env).monitor(self.monitor());
        if let Some(dir) = &self.dir {
            runner = runner.current_dir(dir);
        }
        Git::new(runner).with_program(self.config.git.command.clone())
    }
}

fn tracing_level(level: LogLevel) -> tracing::Level {
    match level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    }
}

/// Print the resolved config.
pub fn show_config(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&ctx.config),
        OutputFormat::Text => {
            match &ctx.source {
                Some(path) => println!("# Config file: {}", path.display()),
                None => println!("# No config file, showing defaults"),
            }
            println!();
            let content =
                toml::to_string_pretty(&ctx.config).context("Failed to serialize config")?;
            print!("{}", content);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = AppContext::load(Some(&missing), None).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config"));
    }

    #[test]
    fn explicit_config_is_loaded_and_repaired() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gitmigrate.toml");
        std::fs::write(
            &path,
            "[git]\nlocale = \"\"\n\n[push]\nremote = \"github\"\nbatch_size = 50\n",
        )
        .unwrap();

        let ctx = AppContext::load(Some(&path), Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(ctx.config.push.remote, "github");
        assert_eq!(ctx.config.push.batch_size, 50);
        assert_eq!(ctx.config.git.locale, "C");
        assert_eq!(ctx.source.as_deref(), Some(path.as_path()));
        assert_eq!(ctx.environment().get("LC_ALL"), Some("C"));
    }

    #[test]
    fn dir_must_be_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gitmigrate.toml");
        std::fs::write(&path, "").unwrap();
        let err = AppContext::load(Some(&path), Some(path.clone())).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn default_config_levels_match_library_monitor() {
        let ctx = AppContext {
            config: MigrateConfig::default(),
            source: None,
            dir: None,
        };
        let from_config = ctx.monitor();
        let library = TaskMonitor::default();
        assert_eq!(from_config.stdout_level, library.stdout_level);
        assert_eq!(from_config.stderr_level, library.stderr_level);
        assert_eq!(library.stderr_level, tracing::Level::WARN);
        assert_eq!(from_config.poll_interval, library.poll_interval);
    }

    #[test]
    fn monitor_follows_config_levels() {
        let mut config = MigrateConfig::default();
        config.monitor.stderr_level = LogLevel::Error;
        config.monitor.poll_interval_ms = 250;
        let ctx = AppContext {
            config,
            source: None,
            dir: None,
        };
        let monitor = ctx.monitor();
        assert_eq!(monitor.stderr_level, tracing::Level::ERROR);
        assert_eq!(monitor.stdout_level, tracing::Level::INFO);
        assert_eq!(monitor.poll_interval, Duration::from_millis(250));
    }
}
