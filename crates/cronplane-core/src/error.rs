use thiserror::Error;

/// Unified error kinds shared across the cronplane crates.
///
/// Backends map their native failures onto these kinds at the boundary so
/// callers can route on meaning rather than on transport detail: the HTTP
/// layer turns `NotFound` into 404 and `InvalidInput` into 400, the worker
/// treats `LockTaken` as "stay a follower", and the execution store turns
/// `Conflict` into a silent no-op before it ever reaches a caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Lock is held by another worker")]
    LockTaken,

    #[error("Transient backend error: {0}")]
    TransientBackend(String),

    #[error("Permanent backend error: {0}")]
    PermanentBackend(String),

    #[error("Version conflict: stored record is newer")]
    Conflict,

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short error code string used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::LockTaken => "LOCK_TAKEN",
            Error::TransientBackend(_) => "TRANSIENT_BACKEND",
            Error::PermanentBackend(_) => "PERMANENT_BACKEND",
            Error::Conflict => "CONFLICT",
            Error::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures the caller may retry (the queue will redeliver).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientBackend(_) | Error::UpstreamTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
