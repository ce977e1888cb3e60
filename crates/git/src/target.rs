use gitmigrate_core::{CommitRef, PushAttempt, PushStatus, PushTarget};
use tracing::warn;

use crate::error::{GitError, Result};
use crate::ops::Git;

/// Pushes to one named remote with `git push`.
pub struct GitPushTarget<'a> {
    git: &'a Git,
    remote: String,
    interactive: bool,
}

impl<'a> GitPushTarget<'a> {
    pub fn new(git: &'a Git, remote: impl Into<String>) -> Self {
        Self {
            git,
            remote: remote.into(),
            interactive: false,
        }
    }

    /// Let pushes share the terminal for credential prompts.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn push_args(&self, args: &[&str]) -> Result<bool> {
        let out = self.git.push(args, self.interactive)?;
        if !out.success() {
            warn!("git push {} exited with {}", args.join(" "), out.exit_code);
        }
        Ok(out.success())
    }

    /// Push every local branch at once, or only `branch`, setting upstreams.
    pub fn push_whole(&self, branch: Option<&str>) -> Result<bool> {
        match branch {
            Some(branch) => {
                let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
                self.push_args(&["--set-upstream", &self.remote, &refspec])
            }
            None => self.push_args(&["--set-upstream", &self.remote, "--all"]),
        }
    }

    pub fn push_all_tags(&self) -> Result<bool> {
        self.push_args(&[&self.remote, "--tags"])
    }

    pub fn push_tag(&self, tag: &str) -> Result<bool> {
        let refspec = format!("refs/tags/{tag}:refs/tags/{tag}");
        self.push_args(&[&self.remote, &refspec])
    }
}

impl PushTarget for GitPushTarget<'_> {
    type Error = GitError;

    fn commit_at(&mut self, branch: &str, ancestors: usize) -> Result<CommitRef> {
        self.git.rev_parse(&format!("refs/heads/{branch}~{ancestors}"))
    }

    fn push(&mut self, attempt: &PushAttempt) -> Result<PushStatus> {
        let refspec = format!("{}:{}", attempt.tip_commit, attempt.destination_ref);
        Ok(if self.push_args(&[&self.remote, &refspec])? {
            PushStatus::Accepted
        } else {
            PushStatus::Rejected
        })
    }
}
