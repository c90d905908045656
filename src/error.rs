//! Error taxonomy shared by the profile resolver, the credential cache and the
//! token exchange. Messages name the failing step only; the underlying cause
//! is exposed through `source()` and printed as part of the error chain.

use std::{io, path::PathBuf};

/// Failure reported by a [`TokenExchanger`](crate::credentials::TokenExchanger).
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    /// The token service answered, but not with success.
    #[error("token service returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (network, credentials, signing).
    #[error("token service unreachable: {0}")]
    Transport(String),

    #[error("token service returned no credentials")]
    MissingCredentials,

    #[error("token service returned an unrepresentable expiration")]
    InvalidExpiration,

    #[error("session duration {0}s is out of range")]
    InvalidDuration(u32),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to read {}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("unable to parse {}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    Config(String),

    #[error("invalid profile name {0:?}")]
    InvalidProfileName(String),

    #[error("cache file {}", path.display())]
    CacheIo { path: PathBuf, source: io::Error },

    #[error("unable to encode cache entry")]
    CacheEncode(#[from] serde_yaml::Error),

    #[error("an MFA code is required but standard input is not a terminal")]
    NoTerminal,

    #[error("MFA prompt cancelled")]
    PromptCancelled,

    #[error("invalid MFA code: expected 6 digits")]
    InvalidCode,

    #[error("MFA prompt failed")]
    PromptIo(#[source] io::Error),

    #[error("unable to obtain token")]
    Exchange(#[from] ExchangeError),
}

impl Error {
    pub(crate) fn cache_io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::CacheIo { path, source }
    }
}
