// Error taxonomy shared by every operation in the crate.

use sea_orm::DbErr;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed client input: scope, cursor, limit, focus, VLAN id.
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(String),

    /// The backing store failed; distinct from a missing row.
    #[error("store error: {0}")]
    Store(#[from] DbErr),

    /// A third-party source (import URL, probe infrastructure) failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl Error {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    // Machine readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation { code, .. } => code,
            Error::NotFound(_) => "not_found",
            Error::Store(_) => "store_unavailable",
            Error::Upstream(_) => "upstream_error",
        }
    }

    // HTTP equivalent status for callers that front this crate with a web shell.
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::NotFound(_) => 404,
            Error::Store(_) => 503,
            Error::Upstream(_) => 502,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upstream(e.to_string())
    }
}
