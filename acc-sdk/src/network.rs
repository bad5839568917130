//! Network selection and server endpoints.
//!
//! The SDK talks to two services: the relay, which owns ledgers, nonces and
//! payment tasks, and the save server, which ingests purchases. A
//! [`NetworkType`] names a well-known deployment; [`NetworkEndpoints`] holds
//! the resolved base URLs and may also be built for a private deployment.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// A well-known deployment of the relay and save servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Production network.
    #[serde(alias = "main_net")]
    MainNet,
    /// Public test network.
    #[serde(alias = "test_net")]
    TestNet,
    /// Servers running on the local machine.
    #[serde(alias = "local_host")]
    LocalHost,
}

impl NetworkType {
    /// Base URL of the relay server.
    #[must_use]
    pub const fn relay_url(self) -> &'static str {
        match self {
            Self::MainNet => "https://relay.main.acccoin.io",
            Self::TestNet => "https://relay.test.acccoin.io",
            Self::LocalHost => "http://127.0.0.1:7070",
        }
    }

    /// Base URL of the save server.
    #[must_use]
    pub const fn save_url(self) -> &'static str {
        match self {
            Self::MainNet => "https://save.main.acccoin.io",
            Self::TestNet => "https://save.test.acccoin.io",
            Self::LocalHost => "http://127.0.0.1:3030",
        }
    }
}

impl Display for NetworkType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MainNet => "mainnet",
            Self::TestNet => "testnet",
            Self::LocalHost => "localhost",
        };
        f.write_str(name)
    }
}

/// Error returned when a string names no known network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for NetworkType {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "mainnet" | "main" => Ok(Self::MainNet),
            "testnet" | "test" => Ok(Self::TestNet),
            "localhost" | "local" => Ok(Self::LocalHost),
            _ => Err(UnknownNetwork(s.to_owned())),
        }
    }
}

/// Resolved base URLs of the relay and save servers.
///
/// Immutable once built; a client keeps one for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEndpoints {
    relay: Url,
    save: Url,
}

impl NetworkEndpoints {
    /// Builds endpoints from explicit base URLs.
    #[must_use]
    pub const fn new(relay: Url, save: Url) -> Self {
        Self { relay, save }
    }

    /// Parses endpoints from base URL strings.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if either URL is malformed.
    pub fn parse(relay: &str, save: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            relay: Url::parse(relay)?,
            save: Url::parse(save)?,
        })
    }

    /// Base URL of the relay server.
    #[must_use]
    pub const fn relay(&self) -> &Url {
        &self.relay
    }

    /// Base URL of the save server.
    #[must_use]
    pub const fn save(&self) -> &Url {
        &self.save
    }
}

impl TryFrom<NetworkType> for NetworkEndpoints {
    type Error = url::ParseError;

    fn try_from(network: NetworkType) -> Result<Self, Self::Error> {
        Self::parse(network.relay_url(), network.save_url())
    }
}
