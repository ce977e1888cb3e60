use crate::runner::shell_join;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to start {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", render_non_zero_exit(.command, .exit_code, .stdout, .stderr))]
    NonZeroExit {
        command: Vec<String>,
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Exit code of a failed command, if the error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

fn render_non_zero_exit(
    command: &[String],
    exit_code: &i32,
    stdout: &[u8],
    stderr: &[u8],
) -> String {
    let mut lines = vec![
        format!("[Command failed] {}", shell_join(command)),
        format!("Returncode: {exit_code}"),
    ];
    if !stderr.is_empty() {
        lines.push("___ Standard error ___".to_string());
        lines.extend(String::from_utf8_lossy(stderr).lines().map(String::from));
    }
    if !stdout.is_empty() {
        lines.push("___ Standard output ___".to_string());
        lines.extend(String::from_utf8_lossy(stdout).lines().map(String::from));
    }
    lines.join("\n")
}

pub type Result<T> = std::result::Result<T, ProcessError>;
