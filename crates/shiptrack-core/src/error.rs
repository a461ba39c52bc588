//! Error types for shiptrack-core

use std::fmt;

/// Result type alias for shiptrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shiptrack operations
#[derive(Debug)]
pub enum Error {
    /// Credential missing, expired, or rejected (401/403)
    Unauthenticated(String),

    /// Resource not found (404)
    NotFound(String),

    /// API rate limit exceeded
    RateLimited(String),

    /// Provider-side failure (5xx)
    ServerError(String),

    /// 2xx response whose body could not be decoded
    MalformedResponse(String),

    /// Optimistic concurrency failure (stale blob sha)
    Conflict(String),

    /// Transport failure or any other rejected request
    Http(String),

    /// Log text lacks the publish marker
    MissingMarker,

    /// Log text has the marker but no tag line
    NoMatch,

    /// No resolved tag available for the operation
    MissingTag(String),

    /// No successful workflow run on the branch
    NoRun(String),

    /// Run has no `build-and-publish` job
    NoBuildJob(String),

    /// Config file lacks the declared version key
    InvalidConfigFile(String),

    /// Selected modules without a version
    MissingVersions(Vec<String>),

    /// Every (module, environment) pair was skipped
    NoFilesUpdated,

    /// Branch or ref already present (provider 422)
    AlreadyExists(String),

    /// Local VCS command failed
    Vcs(String),

    /// Invalid configuration
    Config(String),

    /// Secret store failure
    Secret(String),

    /// I/O error
    Io(std::io::Error),

    /// YAML parsing error
    Yaml(String),


    /// Other errors
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::RateLimited(msg) => write!(f, "Rate limit exceeded: {}", msg),
            Error::ServerError(msg) => write!(f, "Server error: {}", msg),
            Error::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::Http(msg) => write!(f, "HTTP error: {}", msg),
            Error::MissingMarker => write!(f, "Log does not contain a gated artifact push"),
            Error::NoMatch => write!(f, "Log does not contain a tag line"),
            Error::MissingTag(msg) => write!(f, "Missing tag: {}", msg),
            Error::NoRun(msg) => write!(f, "No successful run: {}", msg),
            Error::NoBuildJob(msg) => write!(f, "No build-and-publish job: {}", msg),
            Error::InvalidConfigFile(msg) => write!(f, "Invalid config file: {}", msg),
            Error::MissingVersions(modules) => {
                write!(f, "Missing versions for: {}", modules.join(", "))
            }
            Error::NoFilesUpdated => write!(f, "No files were updated"),
            Error::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Error::Vcs(msg) => write!(f, "VCS error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Secret(msg) => write!(f, "Secret store error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Yaml(msg) => write!(f, "YAML error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // reqwest errors carry the URL, never headers
        Error::Http(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::MalformedResponse(format!("invalid base64 content: {}", err))
    }
}

/// Fieldless error category for zero-cost pattern matching.
///
/// Single byte representation (`#[repr(u8)]`), `Copy`, no allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    /// Credential rejected
    Unauthenticated,
    /// Resource not found
    NotFound,
    /// Rate limit exceeded
    RateLimited,
    /// Provider-side failure
    ServerError,
    /// Undecodable 2xx body
    MalformedResponse,
    /// Stale sha
    Conflict,
    /// Transport or other HTTP error
    Http,
    /// Publish marker absent
    MissingMarker,
    /// Tag line absent
    NoMatch,
    /// No resolved tag
    MissingTag,
    /// No successful run
    NoRun,
    /// No build job
    NoBuildJob,
    /// Config key absent
    InvalidConfigFile,
    /// Modules without versions
    MissingVersions,
    /// Nothing updated
    NoFilesUpdated,
    /// Ref already present
    AlreadyExists,
    /// VCS failure
    Vcs,
    /// Configuration error
    Config,
    /// Secret store failure
    Secret,
    /// I/O error
    Io,
    /// YAML error
    Yaml,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind as a Copy enum.
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::ServerError(_) => ErrorKind::ServerError,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Http(_) => ErrorKind::Http,
            Error::MissingMarker => ErrorKind::MissingMarker,
            Error::NoMatch => ErrorKind::NoMatch,
            Error::MissingTag(_) => ErrorKind::MissingTag,
            Error::NoRun(_) => ErrorKind::NoRun,
            Error::NoBuildJob(_) => ErrorKind::NoBuildJob,
            Error::InvalidConfigFile(_) => ErrorKind::InvalidConfigFile,
            Error::MissingVersions(_) => ErrorKind::MissingVersions,
            Error::NoFilesUpdated => ErrorKind::NoFilesUpdated,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::Vcs(_) => ErrorKind::Vcs,
            Error::Config(_) => ErrorKind::Config,
            Error::Secret(_) => ErrorKind::Secret,
            Error::Io(_) => ErrorKind::Io,
            Error::Yaml(_) => ErrorKind::Yaml,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Borrow the error message without allocating.
    ///
    /// Variants without a stored message return a fixed description.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Error::Unauthenticated(msg)
            | Error::NotFound(msg)
            | Error::RateLimited(msg)
            | Error::ServerError(msg)
            | Error::MalformedResponse(msg)
            | Error::Conflict(msg)
            | Error::Http(msg)
            | Error::MissingTag(msg)
            | Error::NoRun(msg)
            | Error::NoBuildJob(msg)
            | Error::InvalidConfigFile(msg)
            | Error::AlreadyExists(msg)
            | Error::Vcs(msg)
            | Error::Config(msg)
            | Error::Secret(msg)
            | Error::Yaml(msg)
            | Error::Other(msg) => msg,
            Error::MissingMarker => "missing publish marker",
            Error::NoMatch => "missing tag line",
            Error::MissingVersions(_) => "missing module versions",
            Error::NoFilesUpdated => "no files updated",
            Error::Io(_) => "I/O error",
        }
    }

    /// True for failures reported by the remote API rather than by local logic.
    #[inline]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unauthenticated
                | ErrorKind::NotFound
                | ErrorKind::RateLimited
                | ErrorKind::ServerError
                | ErrorKind::MalformedResponse
                | ErrorKind::Conflict
                | ErrorKind::Http
                | ErrorKind::AlreadyExists
        )
    }
}
