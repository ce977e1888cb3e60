//! Branch and tag listings as the push orchestrator needs them.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{GitError, Result};
use crate::ops::Git;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

/// Branch names split into conventional primary names and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchInventory {
    pub defaults: Vec<String>,
    pub others: Vec<String>,
}

impl BranchInventory {
    /// Push order: default branches first, each group in listing order.
    pub fn push_order(&self) -> impl Iterator<Item = &str> {
        self.defaults
            .iter()
            .chain(self.others.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defaults.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.others.is_empty()
    }
}

/// A `git svn` remote branch standing in for a Subversion tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvnTagBranch {
    /// Remote-tracking branch name, e.g. `svn/tags/1.0`.
    pub branch: String,
    /// Tag name to create, e.g. `1.0`.
    pub tag: String,
}

/// Parse `git branch --list` output into bare names.
pub fn parse_branch_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let line = ANSI_RE.replace_all(line, "");
            let name = line.trim().trim_start_matches(['*', '+']).trim();
            // Skip symbolic refs and detached HEAD markers.
            if name.is_empty() || name.contains(" -> ") || name.starts_with('(') {
                return None;
            }
            Some(name.to_string())
        })
        .collect()
}

/// Local branch names, or remote-tracking ones when `remote` is set.
pub fn list_branches(git: &Git, remote: bool) -> Result<Vec<String>> {
    let mut args = vec!["branch", "--list", "--no-color"];
    if remote {
        args.push("-r");
    }
    let out = git.output(&args)?;
    let names = parse_branch_list(&out);
    debug!("listed {} {} branch(es)", names.len(), if remote { "remote" } else { "local" });
    Ok(names)
}

pub fn list_tags(git: &Git) -> Result<Vec<String>> {
    git.lines(&["tag", "--list"])
}

/// Stable partition of `names` into those listed in `defaults` and the rest.
pub fn classify_branches<S: AsRef<str>>(names: &[String], defaults: &[S]) -> BranchInventory {
    let (defaults, others): (Vec<String>, Vec<String>) = names
        .iter()
        .cloned()
        .partition(|name| defaults.iter().any(|d| d.as_ref() == name));
    BranchInventory { defaults, others }
}

/// Remote branches below `<prefix>tags/`, paired with the tag name they map to.
pub fn svn_tag_branches(remote_branches: &[String], prefix: &str) -> Vec<SvnTagBranch> {
    let tags_prefix = format!("{prefix}tags/");
    remote_branches
        .iter()
        .filter_map(|branch| {
            let tag = branch.strip_prefix(&tags_prefix)?;
            // `git svn` keeps superseded copies as `name@rev`.
            if tag.is_empty() || tag.contains('@') {
                return None;
            }
            Some(SvnTagBranch {
                branch: branch.clone(),
                tag: tag.to_string(),
            })
        })
        .collect()
}

/// Check that `name` names exactly one local branch and no tag.
pub fn resolve_target(git: &Git, name: &str) -> Result<String> {
    let local = list_branches(git, false)?;
    if !local.iter().any(|b| b == name) {
        return Err(GitError::InventoryInconsistency(format!(
            "no local branch named {name}"
        )));
    }
    if git.ref_exists(&format!("refs/tags/{name}"))? {
        return Err(GitError::InventoryInconsistency(format!(
            "{name} is both a branch and a tag"
        )));
    }
    Ok(name.to_string())
}
