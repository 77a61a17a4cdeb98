//! Per-bucket append streams
//!
//! Each cached [`LogStream`] owns a command queue drained by one writer task.
//! The queue exists before the file is open, so records sent while the open
//! is still pending are written in call order once it completes.
//!
//! If the open or a write fails, the writer task logs the error and exits.
//! The queue then reports itself dead and the router replaces the entry on
//! the next message for that bucket.

use super::WrittenLine;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc, oneshot};

pub type AppendWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Directory-ensuring open of an append-only sequential writer
#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn open(&self, path: &Path) -> std::io::Result<AppendWriter>;
}

/// Opens real files, creating parent directories first
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOpener;

#[async_trait]
impl StreamOpener for FileOpener {
    async fn open(&self, path: &Path) -> std::io::Result<AppendWriter> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create log directory {}: {}", parent.display(), e),
                )
            })?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o664);

        let file = options.open(path).await?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

enum StreamCommand {
    Write { text: String, notice: WrittenLine },
    Close(Option<oneshot::Sender<()>>),
}

/// Cache entry for one `(topic, day)` bucket
pub struct LogStream {
    filename: PathBuf,
    min_ts: DateTime<Local>,
    max_ts: DateTime<Local>,
    queue: mpsc::UnboundedSender<StreamCommand>,
}

impl LogStream {
    /// Spawn the writer task and return the entry immediately.
    pub(crate) fn spawn(
        filename: PathBuf,
        min_ts: DateTime<Local>,
        max_ts: DateTime<Local>,
        opener: Arc<dyn StreamOpener>,
        lines: broadcast::Sender<WrittenLine>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(filename.clone(), opener, rx, lines));

        Self {
            filename,
            min_ts,
            max_ts,
            queue,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// Inclusive start of the bucket's day
    pub fn min_ts(&self) -> DateTime<Local> {
        self.min_ts
    }

    /// Exclusive end of the bucket's day
    pub fn max_ts(&self) -> DateTime<Local> {
        self.max_ts
    }

    /// False once the writer task has given up
    pub fn is_alive(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Queue `text` (one or more newline-terminated lines)
    pub(crate) fn write(&self, text: String, notice: WrittenLine) -> bool {
        self.queue.send(StreamCommand::Write { text, notice }).is_ok()
    }

    /// Flush and close after everything already queued; fire-and-forget.
    pub(crate) fn close(self) {
        let _ = self.queue.send(StreamCommand::Close(None));
    }

    /// Like [`close`](Self::close), resolving once the file is closed.
    pub(crate) fn close_and_wait(self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.queue.send(StreamCommand::Close(Some(tx)));
        rx
    }
}

async fn run_writer(
    filename: PathBuf,
    opener: Arc<dyn StreamOpener>,
    mut rx: mpsc::UnboundedReceiver<StreamCommand>,
    lines: broadcast::Sender<WrittenLine>,
) {
    let mut out = match opener.open(&filename).await {
        Ok(out) => {
            log::debug!("📝 Opened log stream {}", filename.display());
            out
        }
        Err(e) => {
            log::error!("❌ Error opening write stream for {}: {}", filename.display(), e);
            let dropped = discard_queued(&mut rx);
            if dropped > 0 {
                log::warn!(
                    "⚠️  Dropped {} queued records for {}",
                    dropped,
                    filename.display()
                );
            }
            return;
        }
    };

    let mut written = Vec::new();

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(cmd) = rx.try_recv() {
            batch.push(cmd);
        }

        let mut close_ack = None;
        let mut closing = false;

        for cmd in batch {
            match cmd {
                StreamCommand::Write { text, notice } => {
                    if let Err(e) = out.write_all(text.as_bytes()).await {
                        log::error!("❌ Error writing to {}; closing: {}", filename.display(), e);
                        let _ = out.shutdown().await;
                        return;
                    }
                    written.push(notice);
                }
                StreamCommand::Close(ack) => {
                    close_ack = ack;
                    closing = true;
                    break;
                }
            }
        }

        if closing {
            if let Err(e) = out.shutdown().await {
                log::error!("❌ Failed to close stream for {}: {}", filename.display(), e);
            } else {
                log::debug!("📕 Closed log stream {}", filename.display());
            }
            notify(&lines, &mut written);
            if let Some(ack) = close_ack {
                let _ = ack.send(());
            }
            return;
        }

        if let Err(e) = out.flush().await {
            log::error!("❌ Error flushing {}; closing: {}", filename.display(), e);
            let _ = out.shutdown().await;
            return;
        }
        notify(&lines, &mut written);
    }

    // Entry dropped without an explicit close
    if let Err(e) = out.shutdown().await {
        log::error!("❌ Failed to close stream for {}: {}", filename.display(), e);
    }
}

/// Close the queue and count the writes it still held
fn discard_queued(rx: &mut mpsc::UnboundedReceiver<StreamCommand>) -> usize {
    rx.close();
    let mut dropped = 0;
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            StreamCommand::Write { .. } => dropped += 1,
            StreamCommand::Close(Some(ack)) => {
                let _ = ack.send(());
            }
            StreamCommand::Close(None) => {}
        }
    }
    dropped
}

fn notify(lines: &broadcast::Sender<WrittenLine>, written: &mut Vec<WrittenLine>) {
    for notice in written.drain(..) {
        // No subscribers is fine
        let _ = lines.send(notice);
    }
}
