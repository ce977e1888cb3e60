//! Background draining of a child's output pipe.
//!
//! A [`StreamReader`] owns one reader thread that pulls lines off a pipe and
//! queues them, so the consumer can poll without ever blocking on child I/O.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::warn;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line read from a child stream, newline included when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    pub source: StreamSource,
    /// Per-stream sequence number, starting at 0.
    pub seq: u64,
    pub bytes: Vec<u8>,
}

impl StreamLine {
    /// Lossy text of the line without the trailing line terminator.
    pub fn text(&self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        text.trim_end_matches(['\n', '\r']).to_string()
    }
}

pub struct StreamReader {
    source: StreamSource,
    rx: Receiver<StreamLine>,
    pending: VecDeque<StreamLine>,
    handle: Option<JoinHandle<()>>,
}

impl StreamReader {
    /// Start draining `stream` on a dedicated thread.
    pub fn spawn<R>(stream: R, source: StreamSource) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("gitmigrate-{source}"))
            .spawn(move || {
                let mut reader = BufReader::new(stream);
                let mut seq = 0u64;
                loop {
                    let mut buf = Vec::new();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = StreamLine {
                                source,
                                seq,
                                bytes: buf,
                            };
                            seq += 1;
                            if tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            warn!("error reading {}: {}", source, e);
                            break;
                        }
                    }
                }
                // `tx` drops here; the receiver sees a disconnect once the
                // queue is empty.
            })?;

        Ok(Self {
            source,
            rx,
            pending: VecDeque::new(),
            handle: Some(handle),
        })
    }

    pub fn source(&self) -> StreamSource {
        self.source
    }

    /// Move everything queued by the reader thread into `pending`.
    /// Returns true once the thread has finished sending.
    fn poll(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(line) => self.pending.push_back(line),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// True once the reader thread has stopped and every line was consumed.
    pub fn is_drained(&mut self) -> bool {
        let finished = self.poll();
        finished && self.pending.is_empty()
    }

    /// Lines queued so far; never blocks. A later call yields later lines.
    pub fn drain_available(&mut self) -> impl Iterator<Item = StreamLine> + '_ {
        self.poll();
        self.pending.drain(..)
    }

    /// Wait for the reader thread to finish.
    pub fn join(mut self) {
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} reader thread panicked", self.source);
            }
        }
    }
}

/// Joins the thread; blocks until the writer side of the stream is closed.
impl Drop for StreamReader {
    fn drop(&mut self) {
        self.join_thread();
    }
}
