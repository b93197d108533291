//! Pairing store - persists the TV credential between runs
//!
//! The record is an opaque JSON object; only the `client-key` entry is
//! interpreted (by the webOS client).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const CLIENT_KEY: &str = "client-key";

#[derive(Error, Debug)]
pub enum PairingStoreError {
    #[error("I/O error accessing pairing record at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pairing record at {path} is not a JSON object: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingRecord(Map<String, Value>);

impl PairingRecord {
    pub fn client_key(&self) -> Option<&str> {
        self.0.get(CLIENT_KEY).and_then(Value::as_str)
    }

    pub fn set_client_key(&mut self, key: impl Into<String>) {
        self.0.insert(CLIENT_KEY.to_string(), Value::String(key.into()));
    }
}

#[cfg(test)]
impl PairingRecord {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct PairingStore {
    path: PathBuf,
}

impl PairingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file yields an empty record
    pub async fn load(&self) -> Result<PairingRecord, PairingStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[Pairing] No record at {}, starting empty", self.path.display());
                return Ok(PairingRecord::default());
            }
            Err(source) => {
                return Err(PairingStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| PairingStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the record. Written to a sibling temp file and renamed into
    /// place, so readers never observe a truncated record.
    pub async fn save(&self, record: &PairingRecord) -> Result<(), PairingStoreError> {
        let io_err = |source| PairingStoreError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec(record).map_err(|source| PairingStoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        tracing::debug!("[Pairing] Record saved to {}", self.path.display());
        Ok(())
    }
}
