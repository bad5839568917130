//! Errors raised by the command-line tool.

use acc_sdk::error::EncodingError;
use acc_sdk_evm::SigningError;
use acc_sdk_http::ClientError;

/// Errors that can end an `acc-sdk` invocation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    /// A configured server URL is malformed.
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),
    /// A command argument could not be decoded.
    #[error("invalid argument: {0}")]
    Argument(#[from] EncodingError),
    /// The configured key is malformed.
    #[error("invalid private key: {0}")]
    Key(#[from] SigningError),
    /// The command needs a key and none is configured.
    #[error("no private key configured; set `private_key` in the config file")]
    MissingKey,
    /// A request to the relay failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
