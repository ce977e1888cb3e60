//! `gitmigrate push`: enumerate refs, push branches, push tags, report.

use anyhow::{bail, Context, Result};
use clap::Args;
use gitmigrate_core::{
    BatchPusher, BlockingCommit, BranchReport, ItemKind, OutcomeTracker, PushMode, Summary,
    BATCH_PUSH_FAILED,
};
use gitmigrate_git::{
    classify_branches, list_branches, list_tags, recreate_svn_tags, resolve_target, Git, GitConfig,
    GitError, GitPushTarget,
};
use gitmigrate_runtime_config::PushSettings;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppContext;
use crate::output::{print_json, OutputFormat};

const REF_PUSH_FAILED: &str = "branch ref push failed";
const TAG_PUSH_FAILED: &str = "tag push failed";
const TAG_NOT_ON_REMOTE: &str = "tagged commit is not on the remote";

#[derive(Debug, Clone, Args)]
pub struct PushArgs {
    /// Remote to push to [default: from config, else origin]
    #[arg(long)]
    pub remote: Option<String>,

    /// Add the remote with this URL if it does not exist yet
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Maximum commits per push; 0 pushes everything at once
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Push only this local branch (tags are left alone)
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,

    /// Exit successfully even if some branches or tags failed
    #[arg(long)]
    pub ignore_failures: bool,

    /// Allow batch pushes without a configured credential.helper
    #[arg(long)]
    pub ignore_missing_credential_helper: bool,

    /// Let git use the terminal, e.g. to ask for a password
    #[arg(long)]
    pub interactive: bool,

    /// Create annotated tags from `git svn` tag branches first
    #[arg(long)]
    pub recreate_svn_tags: bool,

    /// Remote branch prefix used by `git svn` [default: svn/]
    #[arg(long, value_name = "PREFIX")]
    pub svn_prefix: Option<String>,

    /// Run `git gc` before pushing
    #[arg(long)]
    pub gc: bool,
}

/// Push settings after command-line flags are applied over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PushPlan {
    remote: String,
    mode: PushMode,
    default_branches: Vec<String>,
    ignore_failures: bool,
    ignore_missing_credential_helper: bool,
    interactive: bool,
    svn_prefix: String,
}

impl PushPlan {
    fn resolve(args: &PushArgs, settings: &PushSettings) -> Self {
        let mut svn_prefix = args
            .svn_prefix
            .clone()
            .unwrap_or_else(|| settings.svn_prefix.clone());
        if !svn_prefix.is_empty() && !svn_prefix.ends_with('/') {
            svn_prefix.push('/');
        }
        Self {
            remote: args.remote.clone().unwrap_or_else(|| settings.remote.clone()),
            mode: PushMode::from_batch_size(args.batch_size.unwrap_or(settings.batch_size)),
            default_branches: settings.default_branches.clone(),
            ignore_failures: args.ignore_failures || settings.ignore_failures,
            ignore_missing_credential_helper: args.ignore_missing_credential_helper
                || settings.ignore_missing_credential_helper,
            interactive: args.interactive || settings.interactive,
            svn_prefix,
        }
    }
}

#[derive(Debug, Serialize)]
struct PushOutput<'a> {
    remote: &'a str,
    batch_size: Option<usize>,
    summary: &'a Summary,
    branches: &'a [BranchReport],
}

pub fn run(ctx: &AppContext, args: PushArgs, format: OutputFormat) -> Result<bool> {
    let plan = PushPlan::resolve(&args, &ctx.config.push);
    let mut env = ctx.environment();
    if !plan.interactive {
        // Fail instead of waiting on a prompt nobody can answer.
        env = env.with_var("GIT_TERMINAL_PROMPT", "0");
    }
    let git = ctx.git(env);

    git.git_dir()
        .context("gitmigrate push has to run inside a git repository")?;
    ensure_remote(&git, &plan.remote, args.remote_url.as_deref())?;
    if plan.mode.is_incremental() && !plan.interactive && !plan.ignore_missing_credential_helper {
        check_credential_helper(&git)?;
    }

    if args.recreate_svn_tags {
        let recreated = recreate_svn_tags(&git, &plan.svn_prefix)?;
        info!(
            "recreated {} tag(s) from {}tags/, {} already existed",
            recreated.created.len(),
            plan.svn_prefix,
            recreated.existing.len()
        );
    }
    if args.gc {
        git.gc()?;
    }

    info!("fetching {}", plan.remote);
    git.fetch(&plan.remote)
        .with_context(|| format!("Failed to fetch {}", plan.remote))?;

    let branches: Vec<String> = match &args.branch {
        Some(name) => vec![resolve_target(&git, name)?],
        None => {
            let listed = list_branches(&git, false)?;
            classify_branches(&listed, &plan.default_branches)
                .push_order()
                .map(str::to_string)
                .collect()
        }
    };
    let tags = if args.branch.is_some() {
        Vec::new()
    } else {
        list_tags(&git)?
    };
    info!(
        "pushing {} branch(es) and {} tag(s) to {}",
        branches.len(),
        tags.len(),
        plan.remote
    );

    let mut tracker = OutcomeTracker::new();
    for branch in &branches {
        tracker.register(ItemKind::Branch, branch);
    }
    for tag in &tags {
        tracker.register(ItemKind::Tag, tag);
    }

    let mut target = GitPushTarget::new(&git, plan.remote.clone()).interactive(plan.interactive);
    let reports = push_branches(
        &git,
        &mut target,
        &plan,
        args.branch.as_deref(),
        &branches,
        &mut tracker,
    )?;
    push_tags(&git, &target, &plan, &tags, &mut tracker)?;

    let summary = tracker.summarize();
    match format {
        OutputFormat::Json => print_json(&PushOutput {
            remote: &plan.remote,
            batch_size: match plan.mode {
                PushMode::Incremental(max) => Some(max.get()),
                PushMode::AllAtOnce => None,
            },
            summary: &summary,
            branches: &reports,
        })?,
        OutputFormat::Text => print!("{}", summary),
    }

    let every_branch_failed = tracker.all_failed(ItemKind::Branch);
    if every_branch_failed {
        warn!("no branch could be pushed");
    }
    Ok(!every_branch_failed && (plan.ignore_failures || !tracker.has_failures()))
}

fn ensure_remote(git: &Git, name: &str, url: Option<&str>) -> Result<()> {
    match (git.remote_url(name)?, url) {
        (Some(existing), Some(url)) if existing != url => Err(GitError::InventoryInconsistency(
            format!("remote {name} points to {existing}, not {url}"),
        )
        .into()),
        (Some(_), _) => Ok(()),
        (None, Some(url)) => {
            info!("adding remote {} at {}", name, url);
            git.add_remote(name, url)?;
            Ok(())
        }
        (None, None) => bail!("remote {name} does not exist (pass --remote-url to add it)"),
    }
}

fn check_credential_helper(git: &Git) -> Result<()> {
    if GitConfig::merged(git).get("credential.helper")?.is_some() {
        return Ok(());
    }
    bail!(
        "credential.helper is not configured, so every batch would ask for credentials. \
         Configure one (for example `git config --global credential.helper cache`), \
         push with --interactive, or pass --ignore-missing-credential-helper"
    )
}

fn push_branches(
    git: &Git,
    target: &mut GitPushTarget<'_>,
    plan: &PushPlan,
    only: Option<&str>,
    branches: &[String],
    tracker: &mut OutcomeTracker,
) -> Result<Vec<BranchReport>> {
    let max = match plan.mode {
        PushMode::AllAtOnce => {
            let pushed = target.push_whole(only)?;
            for branch in branches {
                if pushed {
                    tracker.mark_successful(ItemKind::Branch, branch)?;
                } else {
                    tracker.mark_failed(ItemKind::Branch, branch, BATCH_PUSH_FAILED)?;
                }
            }
            return Ok(Vec::new());
        }
        PushMode::Incremental(max) => max,
    };

    let mut pusher = BatchPusher::new(max);
    let mut reports = Vec::with_capacity(branches.len());
    for branch in branches {
        let unpushed = git.count_unpushed(branch, &plan.remote)?;
        let report = pusher.push_branch(target, branch, unpushed)?;
        let ref_only = report.unpushed == 0 && needs_ref_update(git, &plan.remote, branch)?;
        if ref_only {
            info!("{}: commits are on {} already, pushing the ref", branch, plan.remote);
            if target.push_whole(Some(branch))? {
                tracker.mark_successful(ItemKind::Branch, branch)?;
            } else {
                tracker.mark_failed(ItemKind::Branch, branch, REF_PUSH_FAILED)?;
            }
            reports.push(report);
            continue;
        }
        match (&report.blocked, report.failure_cause()) {
            (Some(blocked), Some(cause)) => {
                let log = git.log_entry(&blocked.commit).unwrap_or_else(|e| {
                    warn!("could not read log of {}: {}", blocked.commit, e);
                    String::new()
                });
                tracker.mark_blocked(
                    branch,
                    cause,
                    BlockingCommit {
                        commit: blocked.commit.clone(),
                        log,
                    },
                )?;
            }
            _ => tracker.mark_successful(ItemKind::Branch, branch)?,
        }
        reports.push(report);
    }
    Ok(reports)
}

/// True if the remote lacks `branch` or its copy does not contain the local
/// tip. A local branch behind its remote copy needs nothing.
fn needs_ref_update(git: &Git, remote: &str, branch: &str) -> Result<bool> {
    let tracking = format!("refs/remotes/{remote}/{branch}");
    if !git.ref_exists(&tracking)? {
        return Ok(true);
    }
    Ok(!git.is_ancestor(&format!("refs/heads/{branch}"), &tracking)?)
}

fn push_tags(
    git: &Git,
    target: &GitPushTarget<'_>,
    plan: &PushPlan,
    tags: &[String],
    tracker: &mut OutcomeTracker,
) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }

    if !plan.mode.is_incremental() && !tracker.has_failures() {
        let pushed = target.push_all_tags()?;
        for tag in tags {
            if pushed {
                tracker.mark_successful(ItemKind::Tag, tag)?;
            } else {
                tracker.mark_failed(ItemKind::Tag, tag, TAG_PUSH_FAILED)?;
            }
        }
        return Ok(());
    }

    for tag in tags {
        if !git.is_on_remote(&format!("refs/tags/{tag}"), &plan.remote)? {
            info!("skipping tag {}: {}", tag, TAG_NOT_ON_REMOTE);
            tracker.mark_skipped(ItemKind::Tag, tag, TAG_NOT_ON_REMOTE)?;
            continue;
        }
        if target.push_tag(tag)? {
            tracker.mark_successful(ItemKind::Tag, tag)?;
        } else {
            tracker.mark_failed(ItemKind::Tag, tag, TAG_PUSH_FAILED)?;
        }
    }
    Ok(())
}
