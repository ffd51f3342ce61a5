use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    #[error("Remote error: {0}")]
    PermanentRemote(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("{failed} of {total} files failed to upload")]
    PartialUpload { failed: usize, total: usize },

    #[error("Too many invalidations in progress. Please wait and try again.")]
    TooManyInvalidations,

    #[error("{0} is not implemented")]
    Unimplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`], carried by reports that outlive the
/// error value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Credential,
    TransientRemote,
    PermanentRemote,
    Build,
    PartialUpload,
    TooManyInvalidations,
    Unimplemented,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Credential(_) => ErrorKind::Credential,
            Error::TransientRemote(_) => ErrorKind::TransientRemote,
            Error::PermanentRemote(_) => ErrorKind::PermanentRemote,
            Error::Build(_) => ErrorKind::Build,
            Error::PartialUpload { .. } => ErrorKind::PartialUpload,
            Error::TooManyInvalidations => ErrorKind::TooManyInvalidations,
            Error::Unimplemented(_) => ErrorKind::Unimplemented,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Prefix the message with `context`, keeping the variant and so the kind
    pub fn with_context(self, context: impl fmt::Display) -> Self {
        let prefix = |message: String| format!("{}: {}", context, message);
        match self {
            Error::Configuration(m) => Error::Configuration(prefix(m)),
            Error::Credential(m) => Error::Credential(prefix(m)),
            Error::TransientRemote(m) => Error::TransientRemote(prefix(m)),
            Error::PermanentRemote(m) => Error::PermanentRemote(prefix(m)),
            Error::Build(m) => Error::Build(prefix(m)),
            Error::Unimplemented(m) => Error::Unimplemented(prefix(m)),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), prefix(e.to_string()))),
            other @ (Error::PartialUpload { .. } | Error::TooManyInvalidations) => other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Credential => "credentials",
            ErrorKind::TransientRemote => "transient remote",
            ErrorKind::PermanentRemote => "remote",
            ErrorKind::Build => "build",
            ErrorKind::PartialUpload => "partial upload",
            ErrorKind::TooManyInvalidations => "too many invalidations",
            ErrorKind::Unimplemented => "unimplemented",
            ErrorKind::Io => "io",
        };
        f.write_str(label)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
