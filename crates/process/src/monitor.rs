//! Live relaying of a long-running child's output.
//!
//! The monitor drains stdout and stderr through two [`StreamReader`]s and
//! hands every line to a [`LineSink`] while the child is still running, so
//! progress of multi-minute pushes shows up in the log as it happens.

use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::Level;

use crate::error::{ProcessError, Result};
use crate::reader::{StreamLine, StreamReader, StreamSource};
use crate::runner::{ChildGuard, Check, CompletedProcess, spawn};

/// Default pause between two polls of the readers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Receives each line of child output exactly once, in per-stream order.
pub trait LineSink {
    fn line(&mut self, line: &StreamLine);
}

/// Emits a `tracing` event at runtime-selected `level`.
#[macro_export]
macro_rules! event_at {
    ($level:expr, $($arg:tt)+) => {{
        let level: ::tracing::Level = $level;
        if level == ::tracing::Level::ERROR {
            ::tracing::error!($($arg)+)
        } else if level == ::tracing::Level::WARN {
            ::tracing::warn!($($arg)+)
        } else if level == ::tracing::Level::INFO {
            ::tracing::info!($($arg)+)
        } else if level == ::tracing::Level::DEBUG {
            ::tracing::debug!($($arg)+)
        } else {
            ::tracing::trace!($($arg)+)
        }
    }};
}

/// Logs stdout and stderr lines at their configured levels.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    pub stdout_level: Level,
    pub stderr_level: Level,
}

impl TracingSink {
    pub fn from_monitor(monitor: &TaskMonitor) -> Self {
        Self {
            stdout_level: monitor.stdout_level,
            stderr_level: monitor.stderr_level,
        }
    }
}

impl LineSink for TracingSink {
    fn line(&mut self, line: &StreamLine) {
        let level = match line.source {
            StreamSource::Stdout => self.stdout_level,
            StreamSource::Stderr => self.stderr_level,
        };
        event_at!(level, "{}", line.text());
    }
}

#[derive(Debug, Clone)]
pub struct TaskMonitor {
    pub poll_interval: Duration,
    pub stdout_level: Level,
    pub stderr_level: Level,
    /// Collect stderr lines into the stdout buffer.
    pub merge_stderr: bool,
}

impl Default for TaskMonitor {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stdout_level: Level::INFO,
            stderr_level: Level::WARN,
            merge_stderr: false,
        }
    }
}

impl TaskMonitor {
    /// Spawn `cmd` with piped output and relay lines to `sink` until both
    /// streams are exhausted, then wait for the exit status.
    pub fn run(
        &self,
        mut cmd: Command,
        command: &[String],
        check: Check,
        sink: &mut dyn LineSink,
    ) -> Result<CompletedProcess> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut guard = ChildGuard::new(spawn(&mut cmd, command)?);

        let child = guard.child_mut();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout pipe not available"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr pipe not available"))?;
        let mut stdout_reader = StreamReader::spawn(stdout, StreamSource::Stdout)?;
        let mut stderr_reader = StreamReader::spawn(stderr, StreamSource::Stderr)?;
        // Rebound after the readers so an early exit kills the child before
        // the readers join, letting their pipes reach EOF.
        let guard = guard;

        let mut collected_stdout = Vec::new();
        let mut collected_stderr = Vec::new();

        while !(stdout_reader.is_drained() && stderr_reader.is_drained()) {
            for line in stderr_reader.drain_available() {
                sink.line(&line);
                if self.merge_stderr {
                    collected_stdout.extend_from_slice(&line.bytes);
                } else {
                    collected_stderr.extend_from_slice(&line.bytes);
                }
            }
            for line in stdout_reader.drain_available() {
                sink.line(&line);
                collected_stdout.extend_from_slice(&line.bytes);
            }
            thread::sleep(self.poll_interval);
        }

        // The pipe handles belong to the reader threads and close with them.
        stderr_reader.join();
        stdout_reader.join();

        let exit_code = guard.wait().map_err(ProcessError::Io)?;
        CompletedProcess {
            command: command.to_vec(),
            exit_code,
            stdout: collected_stdout,
            stderr: collected_stderr,
        }
        .check(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capture, Environment, ProcessRunner};

    #[derive(Default)]
    struct RecordingSink {
        lines: Vec<StreamLine>,
    }

    impl LineSink for RecordingSink {
        fn line(&mut self, line: &StreamLine) {
            self.lines.push(line.clone());
        }
    }

    impl RecordingSink {
        fn concat(&self, source: StreamSource) -> Vec<u8> {
            self.lines
                .iter()
                .filter(|l| l.source == source)
                .flat_map(|l| l.bytes.iter().copied())
                .collect()
        }
    }

    fn runner() -> ProcessRunner {
        ProcessRunner::new(Environment::inherited().with_locale("C")).monitor(TaskMonitor {
            poll_interval: Duration::from_millis(10),
            ..TaskMonitor::default()
        })
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_logged_lines_match_captured_output() {
        let script = "for i in 1 2 3 4 5; do echo out-$i; echo err-$i >&2; done; printf tail";
        let runner = runner();
        let mut sink = RecordingSink::default();
        let result = runner
            .run_streamed(&sh(script), runner.environment(), Check::Strict, &mut sink)
            .unwrap();

        assert_eq!(sink.concat(StreamSource::Stdout), result.stdout);
        assert_eq!(sink.concat(StreamSource::Stderr), result.stderr);
        assert_eq!(result.stdout, b"out-1\nout-2\nout-3\nout-4\nout-5\ntail");
        assert_eq!(result.stderr, b"err-1\nerr-2\nerr-3\nerr-4\nerr-5\n");
        assert_eq!(sink.lines.len(), 11);
    }

    #[test]
    fn test_sequence_numbers_are_per_stream() {
        let runner = runner();
        let mut sink = RecordingSink::default();
        runner
            .run_streamed(
                &sh("echo a; echo b >&2; echo c"),
                runner.environment(),
                Check::Strict,
                &mut sink,
            )
            .unwrap();

        let stdout_seqs: Vec<u64> = sink
            .lines
            .iter()
            .filter(|l| l.source == StreamSource::Stdout)
            .map(|l| l.seq)
            .collect();
        let stderr_seqs: Vec<u64> = sink
            .lines
            .iter()
            .filter(|l| l.source == StreamSource::Stderr)
            .map(|l| l.seq)
            .collect();
        assert_eq!(stdout_seqs, vec![0, 1]);
        assert_eq!(stderr_seqs, vec![0]);
    }

    #[test]
    fn test_lines_arrive_while_child_runs() {
        struct TimedSink(Vec<(String, std::time::Instant)>);
        impl LineSink for TimedSink {
            fn line(&mut self, line: &StreamLine) {
                self.0.push((line.text(), std::time::Instant::now()));
            }
        }

        let runner = runner();
        let mut sink = TimedSink(Vec::new());
        runner
            .run_streamed(
                &sh("echo early; sleep 1; echo late"),
                runner.environment(),
                Check::Strict,
                &mut sink,
            )
            .unwrap();

        let texts: Vec<&str> = sink.0.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["early", "late"]);
        let gap = sink.0[1].1.duration_since(sink.0[0].1);
        assert!(gap >= Duration::from_millis(500), "early line was not relayed live: {gap:?}");
    }

    #[test]
    fn test_strict_failure_attaches_streamed_output() {
        let runner = runner();
        let err = runner
            .run(&sh("echo progress; echo denied >&2; exit 1"), Capture::Streamed, Check::Strict)
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit {
                exit_code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(exit_code, 1);
                assert_eq!(stdout, b"progress\n");
                assert_eq!(stderr, b"denied\n");
            }
            other => panic!("expected NonZeroExit, got: {other}"),
        }
    }

    #[test]
    fn test_lenient_streamed_failure_returns_result() {
        let result = runner()
            .run(&sh("exit 5"), Capture::Streamed, Check::Lenient)
            .unwrap();
        assert_eq!(result.exit_code, 5);
    }

    #[test]
    fn test_merge_stderr_into_stdout() {
        let runner = ProcessRunner::new(Environment::inherited()).monitor(TaskMonitor {
            poll_interval: Duration::from_millis(10),
            merge_stderr: true,
            ..TaskMonitor::default()
        });
        let result = runner
            .run(&sh("echo only-err >&2"), Capture::Streamed, Check::Strict)
            .unwrap();
        assert_eq!(result.stdout, b"only-err\n");
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn test_large_output_is_not_lost() {
        let runner = runner();
        let mut sink = RecordingSink::default();
        let result = runner
            .run_streamed(
                &sh("i=0; while [ $i -lt 2000 ]; do echo line-$i; i=$((i+1)); done"),
                runner.environment(),
                Check::Strict,
                &mut sink,
            )
            .unwrap();
        assert_eq!(sink.lines.len(), 2000);
        assert_eq!(sink.concat(StreamSource::Stdout), result.stdout);
        assert_eq!(sink.lines.last().map(StreamLine::text).as_deref(), Some("line-1999"));
    }
}
