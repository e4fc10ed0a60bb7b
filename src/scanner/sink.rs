//! Append-only JSON-lines destination shared by all workers.
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{self, AsyncWriteExt};
use tokio::sync::Mutex;

use super::outcome::ProbeOutcome;

/// Serializes outcomes into the result file, one record per line.
///
/// The lock is held from serialization until the record has been synced to
/// disk, so records never interleave and every record written before a crash
/// is complete.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl ResultSink {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        debug!("Result file {} opened for appending", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Where records are written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and waits until it is durable.
    ///
    /// When the write fails, the file is cut back to its length before the
    /// record so no partial line is left behind, and the write error is
    /// returned.
    pub async fn record(&self, outcome: &ProbeOutcome) -> io::Result<()> {
        let mut file = self.file.lock().await;

        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');
        let start = file.metadata().await?.len();
        if let Err(e) = append(&mut file, &line).await {
            truncate_to(&mut file, start).await;
            return Err(e);
        }
        Ok(())
    }
}

async fn append(file: &mut File, line: &[u8]) -> io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Drops whatever was written past `len`.
async fn truncate_to(file: &mut File, len: u64) {
    if let Err(e) = file.set_len(len).await {
        warn!("Could not remove a partial record: {e}");
    }
}
