use thiserror::Error;

/// Fatal export failures. Per-attachment problems never show up here: they
/// are downgraded to placeholder pages by the resolver.
#[derive(Debug, Error)]
pub enum Error {
    #[error("capture failed: {0}")]
    Capture(String),

    #[error("capture failed: capture already in progress")]
    CaptureInProgress,

    #[error("configuration rejected: {0}")]
    InvalidGeometry(String),

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Pipeline stage that failed; also the prefix of the message.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Capture(_) | Error::CaptureInProgress => "capture failed",
            Error::InvalidGeometry(_) => "configuration rejected",
            Error::Assembly(_) | Error::Serialization(_) => "serialization failed",
            Error::Cancelled => "export cancelled",
            Error::Io(_) => "write failed",
        }
    }
}
