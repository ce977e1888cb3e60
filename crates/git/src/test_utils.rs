use std::path::Path;
use std::process::Command;

use gitmigrate_process::{Environment, ProcessRunner};

use crate::ops::Git;

/// Run an arbitrary git command in `dir`, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("git {args:?} failed to start: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Initialize a minimal git repository for testing.
///
/// Creates a repo with an initial commit on `main` so that HEAD exists.
pub fn init_test_repo(dir: &Path) {
    run_git(dir, &["init", "--initial-branch=main"]);
    run_git(dir, &["config", "user.email", "test@test.com"]);
    run_git(dir, &["config", "user.name", "Test"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
    run_git(dir, &["config", "tag.gpgsign", "false"]);

    std::fs::write(dir.join("README"), "test repo").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "-m", "init"]);
}

/// Write `name` and commit it on the current branch.
pub fn commit_file(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
    run_git(dir, &["add", name]);
    run_git(dir, &["commit", "-m", &format!("add {name}")]);
}

/// A [`Git`] wrapper rooted at `dir` with the C locale.
pub fn git_in(dir: &Path) -> Git {
    Git::new(ProcessRunner::new(Environment::inherited().with_locale("C")).current_dir(dir))
}

/// Initialize a bare repository to push into.
pub fn init_bare_remote(dir: &Path) {
    run_git(dir, &["init", "--bare", "--initial-branch=main"]);
}

/// Install a `pre-receive` hook in `bare` that refuses any push bringing in a
/// commit whose subject contains `word`.
pub fn reject_subject(bare: &Path, word: &str) {
    let hook = bare.join("hooks").join("pre-receive");
    let script = format!(
        "#!/bin/sh\n\
         while read old new ref; do\n\
         \x20 for c in $(git rev-list \"$new\" --not --all); do\n\
         \x20   if git log -1 --format=%s \"$c\" | grep -q '{word}'; then\n\
         \x20     echo \"rejecting $c\" >&2\n\
         \x20     exit 1\n\
         \x20   fi\n\
         \x20 done\n\
         done\n\
         exit 0\n"
    );
    std::fs::write(&hook, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
