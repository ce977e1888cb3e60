use anyhow::Result;
use gitmigrate_git::{classify_branches, list_branches};
use serde::Serialize;

use crate::config::AppContext;
use crate::output::{print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct BranchListing<'a> {
    remote: bool,
    defaults: &'a [String],
    others: &'a [String],
}

/// Print local branches in push order, or remote-tracking branches.
pub fn run(ctx: &AppContext, remote: bool, format: OutputFormat) -> Result<()> {
    let git = ctx.git(ctx.environment());
    git.git_dir()?;

    let listed = list_branches(&git, remote)?;
    let inventory = if remote {
        classify_branches::<&str>(&listed, &[])
    } else {
        classify_branches(&listed, &ctx.config.push.default_branches)
    };

    match format {
        OutputFormat::Json => print_json(&BranchListing {
            remote,
            defaults: &inventory.defaults,
            others: &inventory.others,
        }),
        OutputFormat::Text => {
            for name in &inventory.defaults {
                println!("{} (default)", name);
            }
            for name in &inventory.others {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
