pub mod artifact;
pub mod csv_store;

pub use artifact::*;
pub use csv_store::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed for {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}
