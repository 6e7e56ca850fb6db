//! Error taxonomy for pipeline stages
//!
//! Every stage fails fast with one of four kinds. The dispatcher never
//! continues past a failed stage, so the kind tells the caller how far a run
//! got before it stopped.

use thiserror::Error;

/// Boxed cause attached to extraction and load errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline error, one variant per failing stage.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Unknown dataset, unknown source mapping, or an invalid route/sink setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The network call or file read behind an extractor failed.
    #[error("Extraction of '{dataset}' failed: {message}")]
    Extraction {
        dataset: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A field was missing or malformed, a number did not parse, or a
    /// growth computation divided by zero.
    #[error("Transformation error: {0}")]
    Transformation(String),

    /// Connecting to or writing into a sink failed.
    #[error("Load into '{target}' failed: {message}")]
    Load {
        target: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Discriminant of [`EtlError`] without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Extraction,
    Transformation,
    Load,
}

pub type Result<T> = std::result::Result<T, EtlError>;

impl EtlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transformation(msg: impl Into<String>) -> Self {
        Self::Transformation(msg.into())
    }

    pub fn extraction(dataset: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            dataset: dataset.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Extraction failure with the underlying cause attached.
    pub fn extraction_caused(
        dataset: impl Into<String>,
        msg: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Extraction {
            dataset: dataset.into(),
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn load(target: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Load {
            target: target.into(),
            message: msg.into(),
            source: None,
        }
    }

    /// Load failure with the underlying cause attached.
    pub fn load_caused(
        target: impl Into<String>,
        msg: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Load {
            target: target.into(),
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Transformation(_) => ErrorKind::Transformation,
            Self::Load { .. } => ErrorKind::Load,
        }
    }
}
