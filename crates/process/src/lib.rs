//! Subprocess execution for gitmigrate.
//!
//! [`ProcessRunner`] launches one child per call with an explicit
//! [`Environment`]; [`Capture::Streamed`] runs go through the [`TaskMonitor`],
//! which relays output line by line while the child is still running.

pub mod env;
pub mod error;
pub mod monitor;
pub mod reader;
pub mod runner;

pub use env::Environment;
pub use error::{ProcessError, Result};
pub use monitor::{LineSink, TaskMonitor, TracingSink, DEFAULT_POLL_INTERVAL};
pub use reader::{StreamLine, StreamReader, StreamSource};
pub use runner::{shell_join, Capture, Check, CompletedProcess, ProcessRunner};
