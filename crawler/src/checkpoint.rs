use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::AppError;

/// Last processed block, durable across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_processed_block: u64,
    pub updated_at: String,
}

/// File-backed checkpoint store. Writes go through a `.tmp` file and an
/// atomic rename; a missing file is not an error.
pub struct CheckpointStore {
    path: PathBuf,
    enabled: bool,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    pub async fn load(&self) -> Result<Option<Checkpoint>, AppError> {
        if !self.enabled {
            return Ok(None);
        }

        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_slice(&data)?))
    }

    pub async fn save(&self, last_processed_block: u64) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }

        let checkpoint = Checkpoint {
            last_processed_block,
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        };
        let data = serde_json::to_vec(&checkpoint)?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
