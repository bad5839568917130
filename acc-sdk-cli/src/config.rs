//! Command-line configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! network = "testnet"
//! timeout_secs = 30
//! poll_interval_ms = 2000
//! private_key = "$ACC_PRIVATE_KEY"
//!
//! # Optional: override the network's server URLs
//! relay_url = "http://127.0.0.1:7070"
//! save_url = "http://127.0.0.1:3030"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `acc-sdk.toml`)
//! - `ACC_NETWORK` - Override the configured network
//! - Keys referenced by `$VAR` in the config file

use std::path::Path;
use std::time::Duration;

use acc_sdk::network::{NetworkEndpoints, NetworkType};
use acc_sdk_http::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "acc-sdk.toml";

/// Top-level configuration of the `acc-sdk` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Deployment to talk to (default: `testnet`).
    #[serde(default = "default_network")]
    pub network: NetworkType,

    /// Relay server URL; overrides the network default.
    #[serde(default)]
    pub relay_url: Option<String>,

    /// Save server URL; overrides the network default.
    #[serde(default)]
    pub save_url: Option<String>,

    /// Per-request timeout in seconds (default: `30`).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pause between task-feed polls in milliseconds (default: `2000`).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wallet key (hex, with or without `0x`). Usually `$VAR`.
    #[serde(default)]
    pub private_key: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            relay_url: None,
            save_url: None,
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            private_key: None,
        }
    }
}

const fn default_network() -> NetworkType {
    NetworkType::TestNet
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_poll_interval_ms() -> u64 {
    2000
}

impl CliConfig {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults. After loading, `$VAR` / `${VAR}`
    /// references are expanded from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Io`] if the file exists but cannot be read and
    /// [`CliError::Toml`] if it cannot be parsed.
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        let content = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            String::new()
        };
        Self::parse(&content)
    }

    /// Parses configuration text, expanding environment references first.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Toml`] if the text is not valid configuration.
    pub fn parse(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(&expand_env_vars(content))?)
    }

    /// Resolved server endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Url`] if an override URL is malformed.
    pub fn endpoints(&self) -> Result<NetworkEndpoints, CliError> {
        let relay = self
            .relay_url
            .as_deref()
            .unwrap_or(self.network.relay_url());
        let save = self
            .save_url
            .as_deref()
            .unwrap_or(self.network.save_url());
        Ok(NetworkEndpoints::parse(relay, save)?)
    }

    /// Client settings derived from this configuration.
    ///
    /// # Errors
    ///
    /// Same as [`CliConfig::endpoints`].
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        Ok(ClientConfig::new(self.endpoints()?)
            .with_timeout(Duration::from_secs(self.timeout_secs)))
    }

    /// Poll interval of the task watcher.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The configured key, if it is set and fully resolved.
    #[must_use]
    pub fn private_key(&self) -> Option<&str> {
        self.private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.starts_with('$'))
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match lookup(&name).filter(|_| !name.is_empty()) {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "KEY" => Some("0xabc".to_owned()),
            "HOST" => Some("127.0.0.1".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn expands_both_forms() {
        assert_eq!(expand_with("k = \"$KEY\"", lookup), "k = \"0xabc\"");
        assert_eq!(
            expand_with("u = \"http://${HOST}:7070\"", lookup),
            "u = \"http://127.0.0.1:7070\""
        );
    }

    #[test]
    fn leaves_unresolved_and_bare_dollars() {
        assert_eq!(expand_with("$MISSING ${MISSING}", lookup), "$MISSING ${MISSING}");
        assert_eq!(expand_with("cost $ 5", lookup), "cost $ 5");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert_eq!(config.network, NetworkType::TestNet);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.private_key().is_none());
        assert_eq!(
            config.endpoints().unwrap(),
            NetworkEndpoints::try_from(NetworkType::TestNet).unwrap()
        );
    }

    #[test]
    fn url_overrides_replace_network_defaults() {
        let config = CliConfig::parse(
            r#"
            network = "mainnet"
            relay_url = "http://127.0.0.1:7070"
            private_key = "$ACC_SDK_TEST_UNSET_KEY"
            "#,
        )
        .unwrap();
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.relay().as_str(), "http://127.0.0.1:7070/");
        assert_eq!(endpoints.save().as_str(), "https://save.main.acccoin.io/");
        assert!(config.private_key().is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            CliConfig::parse("netwrok = \"mainnet\""),
            Err(CliError::Toml(_))
        ));
    }
}
