use std::path::{Path, PathBuf};

use gitmigrate_core::CommitRef;
use gitmigrate_process::{Capture, Check, CompletedProcess, Environment, ProcessRunner};

use crate::error::{GitError, Result};

/// Runs `git` subcommands with fixed argument vectors.
///
/// Every call goes through the wrapped [`ProcessRunner`], so the environment
/// snapshot and working directory are decided once by whoever builds it.
#[derive(Debug, Clone)]
pub struct Git {
    runner: ProcessRunner,
    program: String,
}

impl Git {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            program: "git".to_string(),
        }
    }

    /// Use a different `git` executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn environment(&self) -> &Environment {
        self.runner.environment()
    }

    fn command(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.program.as_str())
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    pub fn run(&self, args: &[&str], capture: Capture, check: Check) -> Result<CompletedProcess> {
        Ok(self.runner.run(&self.command(args), capture, check)?)
    }

    /// Run with `env` instead of the runner's snapshot, for this call only.
    pub fn run_with_env(
        &self,
        args: &[&str],
        env: &Environment,
        capture: Capture,
        check: Check,
    ) -> Result<CompletedProcess> {
        Ok(self
            .runner
            .run_with_env(&self.command(args), env, capture, check)?)
    }

    /// Stdout of a successful buffered run, trailing newline removed.
    pub fn output(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args, Capture::Buffered, Check::Strict)?;
        Ok(out.stdout_text().trim_end().to_string())
    }

    /// Non-empty stdout lines of a successful buffered run.
    pub fn lines(&self, args: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .output(args)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// The repository's git directory; [`GitError::NotARepo`] outside one.
    pub fn git_dir(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--git-dir"], Capture::Buffered, Check::Lenient)?;
        if !out.success() {
            let dir = self
                .runner
                .working_dir()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            return Err(GitError::NotARepo(dir));
        }
        Ok(PathBuf::from(out.stdout_text().trim_end()))
    }

    /// Full hash of the commit `rev` points at.
    pub fn rev_parse(&self, rev: &str) -> Result<CommitRef> {
        let spec = format!("{rev}^{{commit}}");
        let hash = self.output(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !is_object_hash(&hash) {
            return Err(GitError::Parse {
                command: format!("git rev-parse --verify {spec}"),
                output: hash,
            });
        }
        Ok(CommitRef::new(hash))
    }

    /// First-parent commits of local `branch` not reachable from any
    /// remote-tracking branch of `remote`.
    pub fn count_unpushed(&self, branch: &str, remote: &str) -> Result<usize> {
        let local = format!("refs/heads/{branch}");
        let remotes = format!("--remotes={remote}");
        let count = self.output(&[
            "rev-list",
            "--first-parent",
            "--count",
            &local,
            "--not",
            &remotes,
        ])?;
        count.trim().parse().map_err(|_| GitError::Parse {
            command: format!("git rev-list --first-parent --count {local} --not {remotes}"),
            output: count,
        })
    }

    /// `git log -1` rendering of one commit.
    pub fn log_entry(&self, commit: &CommitRef) -> Result<String> {
        self.output(&["log", "-1", commit.as_str()])
    }

    /// True if the tip of `rev` is contained in a remote-tracking branch of `remote`.
    pub fn is_on_remote(&self, rev: &str, remote: &str) -> Result<bool> {
        let commit = self.rev_parse(rev)?;
        let pattern = format!("refs/remotes/{remote}");
        let hits = self.output(&[
            "for-each-ref",
            "--count=1",
            "--format=%(refname)",
            "--contains",
            commit.as_str(),
            &pattern,
        ])?;
        Ok(!hits.is_empty())
    }

    pub fn ref_exists(&self, full_ref: &str) -> Result<bool> {
        let out = self.run(
            &["show-ref", "--verify", "--quiet", full_ref],
            Capture::Buffered,
            Check::Lenient,
        )?;
        Ok(out.success())
    }

    /// Whether `ancestor` is reachable from `descendant` (true when equal).
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let out = self.run(
            &["merge-base", "--is-ancestor", ancestor, descendant],
            Capture::Buffered,
            Check::Lenient,
        )?;
        // Exit 1 means "not an ancestor"; anything else above 0 is an error.
        if out.exit_code == 1 {
            return Ok(false);
        }
        out.check(Check::Strict)?;
        Ok(true)
    }

    /// Configured URL of `name`, `None` if there is no such remote.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let out = self.run(&["remote", "get-url", name], Capture::Buffered, Check::Lenient)?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(out.stdout_text().trim().to_string()))
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.run(&["remote", "add", name, url], Capture::Buffered, Check::Strict)?;
        Ok(())
    }

    /// Fetch `remote`, relaying progress to the log.
    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", remote], Capture::Streamed, Check::Strict)?;
        Ok(())
    }

    pub fn gc(&self) -> Result<()> {
        self.run(&["gc"], Capture::Streamed, Check::Strict)?;
        Ok(())
    }

    /// `git push <args>`; a non-zero exit is returned, not raised.
    ///
    /// Interactive pushes share the terminal so credential prompts reach the
    /// user; otherwise output is streamed to the log.
    pub fn push(&self, args: &[&str], interactive: bool) -> Result<CompletedProcess> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("push");
        full.extend_from_slice(args);
        let capture = if interactive {
            Capture::None
        } else {
            Capture::Streamed
        };
        self.run(&full, capture, Check::Lenient)
    }
}

fn is_object_hash(s: &str) -> bool {
    matches!(s.len(), 40 | 64) && s.bytes().all(|b| b.is_ascii_hexdigit())
}
