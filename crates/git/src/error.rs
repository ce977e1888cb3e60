use std::path::PathBuf;

use gitmigrate_process::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("not a git repository: {0}")]
    NotARepo(PathBuf),

    #[error("inventory inconsistency: {0}")]
    InventoryInconsistency(String),

    #[error("could not parse output of `{command}`: {output:?}")]
    Parse { command: String, output: String },

    #[error("invalid git config key: {0:?}")]
    InvalidConfigKey(String),
}

pub type Result<T> = std::result::Result<T, GitError>;
