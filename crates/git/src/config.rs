use gitmigrate_process::{Capture, Check};

use crate::error::{GitError, Result};
use crate::ops::Git;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    /// The repository's own `.git/config`.
    Local,
    /// The user's `~/.gitconfig`.
    Global,
    /// Reads resolve across system, global and local files; writes go to the
    /// repository.
    Merged,
}

impl ConfigScope {
    fn args<'k>(self, rest: &[&'k str]) -> Vec<&'k str> {
        let mut args = vec!["config"];
        match self {
            Self::Local => args.push("--local"),
            Self::Global => args.push("--global"),
            Self::Merged => {}
        }
        args.extend_from_slice(rest);
        args
    }
}

/// Reads and writes `git config` values in one scope.
pub struct GitConfig<'a> {
    git: &'a Git,
    scope: ConfigScope,
}

impl<'a> GitConfig<'a> {
    pub fn new(git: &'a Git, scope: ConfigScope) -> Self {
        Self { git, scope }
    }

    pub fn local(git: &'a Git) -> Self {
        Self::new(git, ConfigScope::Local)
    }

    pub fn global(git: &'a Git) -> Self {
        Self::new(git, ConfigScope::Global)
    }

    pub fn merged(git: &'a Git) -> Self {
        Self::new(git, ConfigScope::Merged)
    }

    /// The value of `key`, `None` if it is not set in this scope.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let out = self.git.run(
            &self.scope.args(&["--get", key]),
            Capture::Buffered,
            Check::Lenient,
        )?;
        // git exits 1 for a missing key and uses other codes for real errors.
        if out.exit_code == 1 {
            return Ok(None);
        }
        let out = out.check(Check::Strict)?;
        Ok(Some(out.stdout_text().trim_end().to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.git.run(
            &self.scope.args(&[key, value]),
            Capture::Buffered,
            Check::Strict,
        )?;
        Ok(())
    }

    /// Remove `key`; unsetting a key that is not there is not an error.
    pub fn unset(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let out = self.git.run(
            &self.scope.args(&["--unset", key]),
            Capture::Buffered,
            Check::Lenient,
        )?;
        // 5: the key was not set.
        if out.exit_code != 5 {
            out.check(Check::Strict)?;
        }
        Ok(())
    }
}

/// Keys are passed positionally, so anything that looks like an option is refused.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('-') {
        return Err(GitError::InvalidConfigKey(key.to_string()));
    }
    Ok(())
}
