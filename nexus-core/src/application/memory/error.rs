use std::path::PathBuf;
use thiserror::Error;

use crate::infrastructure::model::ModelError;
use crate::infrastructure::store::StoreError;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory file {path} could not be read or written: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("consolidation model call failed: {0}")]
    Model(#[from] ModelError),
    #[error("consolidation response held no fact list")]
    NoFacts,
}

impl MemoryError {
    pub(super) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
