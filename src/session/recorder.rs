//! Session recorder
//!
//! Serialization and ordering checks happen on the caller's thread; actual
//! file writes happen on a dedicated writer thread so a slow disk never
//! stalls the tick loop.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{SessionEntry, SessionError, SessionHeader};

pub struct SessionRecorder {
    path: PathBuf,
    line_tx: Option<Sender<String>>,
    writer_thread: Option<JoinHandle<()>>,
    corrupted: Arc<AtomicBool>,
    last_timestamp: Option<f64>,
    entries_written: u64,
}

impl SessionRecorder {
    /// Create a session file at `path` and write its header. The header
    /// write is synchronous so an unwritable path fails here, not on some
    /// later append.
    pub fn create(path: impl AsRef<Path>, header: &SessionHeader) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        let header_line = serde_json::to_string(header)?;
        writer.write_all(header_line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        let corrupted = Arc::new(AtomicBool::new(false));
        let (line_tx, line_rx) = mpsc::channel::<String>();

        let thread_corrupted = Arc::clone(&corrupted);
        let thread_path = path.clone();
        let writer_thread = thread::Builder::new()
            .name("session-writer".to_string())
            .spawn(move || {
                for line in line_rx {
                    if let Err(e) = writer
                        .write_all(line.as_bytes())
                        .and_then(|()| writer.write_all(b"\n"))
                    {
                        log::error!("session write to {} failed: {e}", thread_path.display());
                        thread_corrupted.store(true, Ordering::SeqCst);
                        return;
                    }
                }
                if let Err(e) = writer.flush() {
                    log::error!("session flush to {} failed: {e}", thread_path.display());
                    thread_corrupted.store(true, Ordering::SeqCst);
                }
            })
            .map_err(SessionError::Io)?;

        log::info!("recording session to {}", path.display());

        Ok(Self {
            path,
            line_tx: Some(line_tx),
            writer_thread: Some(writer_thread),
            corrupted,
            last_timestamp: None,
            entries_written: 0,
        })
    }

    /// Append one entry. Timestamps must not go backwards; once a write
    /// fails the recorder refuses everything else.
    pub fn append(&mut self, entry: &SessionEntry) -> Result<(), SessionError> {
        if self.corrupted.load(Ordering::SeqCst) {
            return Err(SessionError::Corrupted);
        }

        if let Some(last) = self.last_timestamp {
            if entry.timestamp_s < last {
                return Err(SessionError::OutOfOrderAppend {
                    last,
                    new: entry.timestamp_s,
                });
            }
        }

        let line = serde_json::to_string(entry)?;
        match &self.line_tx {
            Some(tx) if tx.send(line).is_ok() => {
                self.last_timestamp = Some(entry.timestamp_s);
                self.entries_written += 1;
                Ok(())
            }
            _ => {
                // Writer thread is gone; it already logged why
                self.corrupted.store(true, Ordering::SeqCst);
                Err(SessionError::Corrupted)
            }
        }
    }

    /// Entries accepted so far.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close the session file. Reports a write failure that
    /// happened after the last successful append.
    pub fn close(mut self) -> Result<(), SessionError> {
        self.shutdown();
        if self.corrupted.load(Ordering::SeqCst) {
            return Err(SessionError::Corrupted);
        }
        log::info!(
            "closed session {} ({} entries)",
            self.path.display(),
            self.entries_written
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        drop(self.line_tx.take());
        if let Some(handle) = self.writer_thread.take() {
            if handle.join().is_err() {
                log::error!("session writer thread panicked");
                self.corrupted.store(true, Ordering::SeqCst);
            }
        }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
