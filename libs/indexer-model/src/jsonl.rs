use std::io;
use std::path::Path;

use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Buffered JSON-lines writer.
///
/// Parent directories are created on open. Callers must `flush` before
/// dropping the writer or trailing lines may be lost.
pub struct JsonlWriter {
    writer: BufWriter<File>,
}

impl JsonlWriter {
    /// Opens `path`, truncating any existing content.
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path, false).await
    }

    /// Opens `path` in append mode.
    pub async fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path, true).await
    }

    async fn open(path: impl AsRef<Path>, append: bool) -> io::Result<Self> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }

        let file = options.open(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Serialises `value` and writes it as a single `\n`-terminated line.
    pub async fn write<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        self.writer.write_all(&line).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}
