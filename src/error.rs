use std::path::PathBuf;
use thiserror::Error;

/// Failures of the generation walk. Both suppress the reply; neither should
/// take the process down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkovError {
    #[error("brain has no chain-start words")]
    EmptyModel,
    #[error("chain index has no successors for {context}")]
    CorruptIndex { context: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed yaml brain {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("corrupt compressed brain {path}: {source}")]
    Compressed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed binary brain {path}: {source}")]
    Binary {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn compressed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Compressed {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("input and output brain must be different files ({0})")]
    SameFile(PathBuf),
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("user map {path} is not one-to-one: `{id}` is used twice")]
    DuplicateUser { path: PathBuf, id: String },
}

/// Startup failures. A brain that cannot be loaded is not served.
#[derive(Debug, Error)]
pub enum BrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Markov(#[from] MarkovError),
}
