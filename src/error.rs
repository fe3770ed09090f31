//! Error types shared by all tools

use thiserror::Error;

/// sysexits.h codes used by the command-line front-ends.
pub mod exit_code {
    pub const USAGE: i32 = 64;
    pub const DATAERR: i32 = 65;
    pub const UNAVAILABLE: i32 = 69;
    pub const SOFTWARE: i32 = 70;
    pub const OSERR: i32 = 71;
    pub const NOPERM: i32 = 77;
    pub const CONFIG: i32 = 78;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Authorization required, run the login command first")]
    AuthorizationRequired,

    #[error("Sign-in failed: {0}")]
    SignIn(String),

    /// A remote call (Telegram or HTTP) failed. Never retried.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Remote answered, but with a non-success status or an unusable body.
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid date '{0}', expected format YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("No matching peer: {0}")]
    NoMatchingPeer(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("DNS API error: {0}")]
    DnsApi(String),

    #[error("Domain has not been found: {0}")]
    DomainNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SessionNotFound(_) | Error::AuthorizationRequired | Error::SignIn(_) => {
                exit_code::NOPERM
            }
            Error::SessionLocked | Error::LockError(_) => exit_code::UNAVAILABLE,
            Error::TransportFailure(_) | Error::NoMatchingPeer(_) => exit_code::UNAVAILABLE,
            Error::DomainNotFound(_) => exit_code::UNAVAILABLE,
            Error::HttpError(_) | Error::SerializationError(_) => exit_code::DATAERR,
            Error::InvalidDateFormat(_) | Error::InvalidArgument(_) => exit_code::USAGE,
            Error::Config(_) | Error::DnsApi(_) => exit_code::CONFIG,
            Error::IoError(_) | Error::Unknown(_) => exit_code::OSERR,
        }
    }
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TransportFailure(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Error::TransportFailure(err.to_string())
        } else if err.is_status() || err.is_decode() || err.is_body() {
            Error::HttpError(err.to_string())
        } else {
            Error::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

/// Exit code for an error surfaced through `anyhow` at a binary boundary.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(exit_code::SOFTWARE)
}
