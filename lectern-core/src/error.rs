use std::path::PathBuf;

use thiserror::Error;

/// Checked failures of the open surface and of configuration loading.
///
/// Model lookups never produce errors; absence is reported through `Option`.
#[derive(Debug, Error)]
pub enum LecternError {
    #[error("{path:?} is not a PDF file")]
    UnsupportedFile { path: PathBuf },

    #[error("failed to open {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("failed to read config file {path:?}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl LecternError {
    pub(crate) fn open(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        LecternError::Open {
            path: path.into(),
            source: err.into(),
        }
    }
}
