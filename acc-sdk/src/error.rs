//! Error types shared by every layer of the SDK.
//!
//! Two families live here:
//!
//! - [`EncodingError`] for caller input that cannot be turned into a canonical
//!   value (amount literals, hex ids, addresses). Raised locally, never sent.
//! - [`ResponseError`] for relay responses that violate the envelope contract,
//!   either because the server reported a failure or because the payload is
//!   missing pieces the caller depends on.

use std::fmt;

/// Failure while normalizing caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Amount literal contains non-digit characters or several decimal points.
    #[error("invalid amount literal: {0:?}")]
    InvalidFormat(String),

    /// Scale is too large to be represented in 256 bits.
    #[error("unsupported decimals: {0}")]
    InvalidDecimals(u8),

    /// Scaled value does not fit in 256 bits.
    #[error("amount overflows 256 bits: {0:?}")]
    Overflow(String),

    /// Not a `0x`-prefixed string of 64 hex digits.
    #[error("invalid 32-byte hex id: {0:?}")]
    InvalidHex(String),

    /// Not a 20-byte hex address.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
}

/// Marker every server-side failure message starts with.
pub const INTERNAL_ERROR_PREFIX: &str = "Internal Error :";

/// Non-zero `code` reported by the relay or save server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    /// Status code from the envelope.
    pub code: i64,
    /// Server-supplied message, if any.
    pub message: Option<String>,
}

impl ServerError {
    /// Creates a server error carrying only the bare code.
    #[must_use]
    pub const fn new(code: i64) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Sets the server-supplied message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{INTERNAL_ERROR_PREFIX} {message} {}", self.code),
            None => write!(f, "{INTERNAL_ERROR_PREFIX} {}", self.code),
        }
    }
}

impl std::error::Error for ServerError {}

/// Failure while unwrapping a response envelope.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The server answered with a non-zero code.
    #[error("{0}")]
    Server(#[from] ServerError),

    /// `code` was zero but `data` was absent or null.
    #[error("{INTERNAL_ERROR_PREFIX} Response is null")]
    NullData,

    /// A sub-object the result depends on was absent.
    #[error("{INTERNAL_ERROR_PREFIX} Response is null ({0})")]
    MissingField(&'static str),

    /// `data` did not have the expected shape.
    #[error("{INTERNAL_ERROR_PREFIX} malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ResponseError {
    /// Returns `true` when the server accepted the call but the payload is unusable.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        !matches!(self, Self::Server(_))
    }

    /// Returns the server status code, if this is a server-reported failure.
    #[must_use]
    pub const fn server_code(&self) -> Option<i64> {
        match self {
            Self::Server(err) => Some(err.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_with_message() {
        let err = ServerError::new(1001).with_message("bad");
        assert_eq!(err.to_string(), "Internal Error : bad 1001");
    }

    #[test]
    fn server_error_bare_code() {
        assert_eq!(ServerError::new(2004).to_string(), "Internal Error : 2004");
    }

    #[test]
    fn null_data_is_malformed() {
        let err = ResponseError::NullData;
        assert!(err.is_malformed());
        assert_eq!(err.server_code(), None);
        assert_eq!(err.to_string(), "Internal Error : Response is null");
    }
}
