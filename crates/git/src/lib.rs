//! `git` as gitmigrate drives it: wrapped subcommands, config access, ref
//! inventory, svn tag recreation and the [`GitPushTarget`] the batch pusher
//! pushes through.

pub mod config;
pub mod error;
pub mod inventory;
pub mod ops;
pub mod tags;
pub mod target;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{ConfigScope, GitConfig};
pub use error::{GitError, Result};
pub use inventory::{
    classify_branches, list_branches, list_tags, parse_branch_list, resolve_target,
    svn_tag_branches, BranchInventory, SvnTagBranch,
};
pub use ops::Git;
pub use tags::{recreate_svn_tags, RecreatedTags};
pub use target::GitPushTarget;
