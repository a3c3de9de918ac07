use std::path::PathBuf;

use thiserror::Error;

/// Failure raised by an action's `run` or `restore_state`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read install manifest {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse install manifest {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize install manifest")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },

    #[error("failed to write install manifest {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid install manifest {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("product {id} {version} is already installed")]
    AlreadyInstalled { id: String, version: String },

    #[error("no installed product matches the patch requirement for {id}")]
    PatchTargetMissing { id: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("action '{id}' failed")]
    Action {
        id: String,
        #[source]
        source: ActionError,
    },

    #[error("install location error: {message}")]
    Location {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl EngineError {
    pub fn location(message: impl Into<String>) -> Self {
        Self::Location {
            message: message.into(),
            source: None,
        }
    }

    pub fn location_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Location {
            message: message.into(),
            source: Some(source),
        }
    }
}
