use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info};

use crate::env::Environment;
use crate::error::{ProcessError, Result};
use crate::monitor::{LineSink, TaskMonitor, TracingSink};

/// How a child's output streams are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Inherit the caller's terminal (interactive prompts work); nothing is captured.
    None,
    /// Read both streams to the end after the child exits.
    Buffered,
    /// Drain both streams concurrently and log lines while the child runs.
    Streamed,
}

/// Whether a non-zero exit status is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Strict,
    Lenient,
}

/// Result of one finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedProcess {
    pub command: Vec<String>,
    /// Exit code, or `-1` if the child was terminated by a signal.
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CompletedProcess {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn a non-zero exit into [`ProcessError::NonZeroExit`] under [`Check::Strict`].
    pub fn check(self, check: Check) -> Result<Self> {
        if check == Check::Strict && !self.success() {
            return Err(ProcessError::NonZeroExit {
                command: self.command,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Ok(self)
    }
}

/// Owns a spawned child until it has been waited on.
///
/// Dropping the guard while the child is still owned kills and reaps it, so
/// an early return never leaves a zombie behind.
pub(crate) struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    pub(crate) fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub(crate) fn wait(mut self) -> std::io::Result<i32> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status.code().unwrap_or(-1))
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Render a command vector so it can be pasted back into a POSIX shell.
pub fn shell_join(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| {
            if !arg.is_empty() && arg.chars().all(is_shell_safe) {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c)
}

/// Launches subprocesses with an explicit environment snapshot.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    env: Environment,
    cwd: Option<PathBuf>,
    monitor: TaskMonitor,
}

impl ProcessRunner {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            cwd: None,
            monitor: TaskMonitor::default(),
        }
    }

    /// Run children in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Use `monitor` for [`Capture::Streamed`] runs.
    pub fn monitor(mut self, monitor: TaskMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn task_monitor(&self) -> &TaskMonitor {
        &self.monitor
    }

    /// Run `command` with the runner's environment.
    pub fn run(&self, command: &[String], capture: Capture, check: Check) -> Result<CompletedProcess> {
        self.run_with_env(command, &self.env, capture, check)
    }

    /// Run `command` with `env` for this one call only.
    pub fn run_with_env(
        &self,
        command: &[String],
        env: &Environment,
        capture: Capture,
        check: Check,
    ) -> Result<CompletedProcess> {
        match capture {
            Capture::Streamed => {
                let mut sink = TracingSink::from_monitor(&self.monitor);
                self.run_streamed(command, env, check, &mut sink)
            }
            Capture::Buffered => self.run_buffered(command, env, check),
            Capture::None => self.run_interactive(command, env, check),
        }
    }

    /// Streamed run that hands every output line to `sink`.
    pub fn run_streamed(
        &self,
        command: &[String],
        env: &Environment,
        check: Check,
        sink: &mut dyn LineSink,
    ) -> Result<CompletedProcess> {
        info!("Executing command: {}", shell_join(command));
        let cmd = self.build(command, env)?;
        self.monitor.run(cmd, command, check, sink)
    }

    fn run_buffered(&self, command: &[String], env: &Environment, check: Check) -> Result<CompletedProcess> {
        debug!("Executing command: {}", shell_join(command));
        let mut cmd = self.build(command, env)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let output = spawn(&mut cmd, command)?.wait_with_output()?;

        CompletedProcess {
            command: command.to_vec(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        }
        .check(check)
    }

    fn run_interactive(&self, command: &[String], env: &Environment, check: Check) -> Result<CompletedProcess> {
        info!("Executing command: {}", shell_join(command));
        let mut cmd = self.build(command, env)?;
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let guard = ChildGuard::new(spawn(&mut cmd, command)?);
        let exit_code = guard.wait()?;

        CompletedProcess {
            command: command.to_vec(),
            exit_code,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
        .check(check)
    }

    fn build(&self, command: &[String], env: &Environment) -> Result<Command> {
        let (program, args) = command.split_first().ok_or(ProcessError::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(args).env_clear().envs(env.iter());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

pub(crate) fn spawn(cmd: &mut Command, command: &[String]) -> Result<Child> {
    cmd.spawn().map_err(|source| ProcessError::Launch {
        program: command.first().cloned().unwrap_or_default(),
        source,
    })
}
