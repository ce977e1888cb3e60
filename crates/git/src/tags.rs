//! Annotated tags recreated from `git svn` tag branches.

use std::collections::HashSet;

use gitmigrate_process::{Capture, Check};
use tracing::info;

use crate::error::{GitError, Result};
use crate::inventory::{list_branches, list_tags, svn_tag_branches, SvnTagBranch};
use crate::ops::Git;

/// What a recreation pass did, tag names in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecreatedTags {
    pub created: Vec<String>,
    /// Tags that already existed locally and were left alone.
    pub existing: Vec<String>,
}

/// Author identity and message of a tag branch tip.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TagSource {
    subject: String,
    name: String,
    email: String,
    /// Raw `<unix seconds> <offset>`, accepted as-is by `GIT_COMMITTER_DATE`.
    date: String,
}

impl TagSource {
    fn read(git: &Git, rev: &str) -> Result<Self> {
        let out = git.output(&[
            "log",
            "-1",
            "--date=raw",
            "--format=%s%x00%an%x00%ae%x00%ad",
            rev,
        ])?;
        let parts: Vec<&str> = out.split('\0').collect();
        match parts.as_slice() {
            [subject, name, email, date] => Ok(Self {
                subject: subject.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                date: date.trim().to_string(),
            }),
            _ => Err(GitError::Parse {
                command: format!("git log -1 {rev}"),
                output: out,
            }),
        }
    }
}

/// Create an annotated tag for every `<prefix>tags/<name>` remote branch.
///
/// The tagger is the tip commit's author, dated at the author date, so the
/// tag looks like it was made when the Subversion tag was.
pub fn recreate_svn_tags(git: &Git, prefix: &str) -> Result<RecreatedTags> {
    let remote = list_branches(git, true)?;
    let known: HashSet<String> = list_tags(git)?.into_iter().collect();
    let mut result = RecreatedTags::default();

    for SvnTagBranch { branch, tag } in svn_tag_branches(&remote, prefix) {
        if known.contains(&tag) {
            info!("tag {} already exists, leaving it alone", tag);
            result.existing.push(tag);
            continue;
        }

        let target = format!("refs/remotes/{branch}");
        let source = TagSource::read(git, &target)?;
        let message = if source.subject.trim().is_empty() {
            tag.clone()
        } else {
            source.subject.clone()
        };
        let env = git.environment().overlay([
            ("GIT_COMMITTER_NAME", source.name.as_str()),
            ("GIT_COMMITTER_EMAIL", source.email.as_str()),
            ("GIT_COMMITTER_DATE", source.date.as_str()),
        ]);

        info!("creating tag {} from {}", tag, branch);
        git.run_with_env(
            &["tag", "-a", "-m", &message, &tag, &target],
            &env,
            Capture::Buffered,
            Check::Strict,
        )?;
        result.created.push(tag);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{git_in, init_test_repo, run_git};

    #[test]
    fn test_recreate_uses_author_identity_and_date() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        std::fs::write(tmp.path().join("release.txt"), "1.0").unwrap();
        run_git(tmp.path(), &["add", "release.txt"]);
        run_git(
            tmp.path(),
            &[
                "commit",
                "-m",
                "Tagging release 1.0",
                "--author=Ann Author <ann@example.com>",
                "--date=1700000000 +0100",
            ],
        );
        run_git(tmp.path(), &["update-ref", "refs/remotes/svn/tags/1.0", "HEAD"]);
        run_git(tmp.path(), &["update-ref", "refs/remotes/svn/tags/0.9", "HEAD~1"]);
        run_git(tmp.path(), &["tag", "0.9", "HEAD~1"]);

        let git = git_in(tmp.path());
        let result = recreate_svn_tags(&git, "svn/").unwrap();
        assert_eq!(result.created, vec!["1.0".to_string()]);
        assert_eq!(result.existing, vec!["0.9".to_string()]);

        let tagger = git
            .output(&[
                "for-each-ref",
                "--format=%(objecttype)|%(taggername)|%(taggeremail)|%(taggerdate:raw)|%(contents:subject)",
                "refs/tags/1.0",
            ])
            .unwrap();
        assert_eq!(
            tagger,
            "tag|Ann Author|<ann@example.com>|1700000000 +0100|Tagging release 1.0"
        );
        assert_eq!(
            git.rev_parse("1.0").unwrap(),
            git.rev_parse("HEAD").unwrap()
        );
    }

    #[test]
    fn test_recreate_without_svn_branches_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        init_test_repo(tmp.path());
        let result = recreate_svn_tags(&git_in(tmp.path()), "svn/").unwrap();
        assert_eq!(result, RecreatedTags::default());
    }
}
