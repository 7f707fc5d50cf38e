use crate::error::{Error, Result};
use async_process::ChildStdin;
use futures_lite::io::AsyncWriteExt;
use std::io::{BufRead, BufReader, Read};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Writes newline-terminated commands to the server's standard input.
///
/// Writes are serialized through an async mutex so concurrent callers (a user
/// command, a countdown broadcast, the player poll) never interleave bytes.
pub struct StdinWriter {
    /// Session label used in logs
    name: String,
    /// Child process stdin
    stdin: Mutex<ChildStdin>,
}

impl StdinWriter {
    /// Takes ownership of the child's stdin.
    pub fn new(name: impl Into<String>, stdin: ChildStdin) -> Self {
        Self {
            name: name.into(),
            stdin: Mutex::new(stdin),
        }
    }

    /// Gets the session label this writer logs under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes `line` followed by a newline and flushes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Command` if the pipe is closed or the write fails.
    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(&data)
            .await
            .map_err(|e| Error::Command(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Command(format!("Failed to flush stdin: {}", e)))?;

        tracing::debug!(session = %self.name, command = %line, "Wrote command to server");
        Ok(())
    }
}

/// Spawns a blocking task that reads `source` one line at a time and forwards
/// each line, in order, into `sink`.
///
/// `source` is a plain pipe, so reads happen on the blocking pool. Invalid UTF-8
/// is replaced rather than dropped. The task ends at EOF, on a read error
/// (forwarded as `Error::Stream`), or when the receiving side goes away.
pub fn spawn_line_reader<R>(
    source: R,
    stream: &'static str,
    sink: mpsc::Sender<Result<String>>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(source);
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer).into_owned();
                    if sink.blocking_send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(stream, error = %e, "Failed to read server output");
                    let _ = sink.blocking_send(Err(Error::Stream(format!(
                        "Failed to read {}: {}",
                        stream, e
                    ))));
                    break;
                }
            }
        }

        tracing::debug!(stream, "Output reader finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_forwards_lines_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let source = std::io::Cursor::new(b"first\nsecond\r\nno newline".to_vec());

        spawn_line_reader(source, "output", tx).await.unwrap();

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line.unwrap());
        }
        assert_eq!(lines, vec!["first\n", "second\r\n", "no newline"]);
    }

    #[tokio::test]
    async fn test_reader_replaces_invalid_utf8() {
        let (tx, mut rx) = mpsc::channel(8);
        let source = std::io::Cursor::new(vec![b'o', b'k', 0xff, b'\n']);

        spawn_line_reader(source, "output", tx).await.unwrap();

        let line = rx.recv().await.unwrap().unwrap();
        assert!(line.starts_with("ok"));
        assert!(line.contains('\u{fffd}'));
    }
}
