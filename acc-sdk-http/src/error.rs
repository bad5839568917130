//! Errors raised by the HTTP clients.

use acc_sdk::error::{EncodingError, ResponseError};
use acc_sdk_evm::SigningError;
use http::StatusCode;

/// Errors that can occur while talking to the relay or the save server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code without a readable envelope.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The envelope reported a failure or violated its contract.
    #[error(transparent)]
    Response(#[from] ResponseError),
    /// Caller input could not be normalized.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The message could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

impl ClientError {
    /// Whether the request never produced a response (connection, timeout).
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::ResponseBodyRead { .. })
    }

    /// Whether the server answered with a non-zero envelope code.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self, Self::Response(ResponseError::Server(_)))
    }

    /// The non-zero envelope code, if the server reported one.
    #[must_use]
    pub const fn server_code(&self) -> Option<i64> {
        match self {
            Self::Response(err) => err.server_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acc_sdk::error::ServerError;

    #[test]
    fn server_errors_are_classified() {
        let err = ClientError::from(ResponseError::from(
            ServerError::new(1001).with_message("bad"),
        ));
        assert!(err.is_server());
        assert!(!err.is_network());
        assert_eq!(err.server_code(), Some(1001));
        assert_eq!(err.to_string(), "Internal Error : bad 1001");
    }

    #[test]
    fn local_errors_have_no_code() {
        let err = ClientError::from(EncodingError::InvalidHex("0x12".to_owned()));
        assert!(!err.is_server());
        assert_eq!(err.server_code(), None);
    }
}
