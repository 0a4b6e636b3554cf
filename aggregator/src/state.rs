use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::fs;

use indexer_db::IndexerState;

use crate::error::AppError;

/// Persists the aggregator's last processed timestamp across runs.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<Option<u64>, AppError>;
    async fn save(&self, ts: u64) -> Result<(), AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    last_processed_ts: u64,
    updated_at: String,
}

/// State in a local JSON file. Writes go through a `.tmp` file and an
/// atomic rename; a missing file is not an error.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<u64>, AppError> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let record: StateRecord = serde_json::from_slice(&data)?;
        Ok(Some(record.last_processed_ts))
    }

    async fn save(&self, ts: u64) -> Result<(), AppError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }

        let record = StateRecord {
            last_processed_ts: ts,
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        };
        let data = serde_json::to_vec(&record)?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// State in the `indexer_state` table under a fixed name.
pub struct DbStateStore {
    db: PgPool,
    name: String,
}

impl DbStateStore {
    pub fn new(db: PgPool, name: String) -> Self {
        Self { db, name }
    }
}

#[async_trait]
impl StateStore for DbStateStore {
    async fn load(&self) -> Result<Option<u64>, AppError> {
        Ok(IndexerState::load(&self.name, &self.db).await?)
    }

    async fn save(&self, ts: u64) -> Result<(), AppError> {
        Ok(IndexerState::save(&self.name, ts, &self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state/aggregator.json"));

        assert!(store.load().await.unwrap().is_none());

        store.save(1_700_000_210).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(1_700_000_210));

        store.save(1_700_000_500).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(1_700_000_500));
    }
}
