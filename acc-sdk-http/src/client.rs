//! Shared request context for every role client.
//!
//! A [`RelayClient`] owns the resolved endpoints, the `reqwest` client and the
//! per-instance caches (side-chain id, chain descriptions). Role clients hold
//! it behind an [`Arc`](std::sync::Arc) so several of them can share one
//! context and its caches.
//!
//! Every response is parsed as a [`ResponseEnvelope`]; non-zero codes surface
//! as [`ResponseError::Server`] and a missing payload as
//! [`ResponseError::NullData`]. Non-200 responses whose body still carries a
//! failed envelope are reported the same way, so the server message is kept.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use acc_sdk::error::ResponseError;
use acc_sdk::id::bytes32_to_hex;
use acc_sdk::network::{NetworkEndpoints, NetworkType};
use acc_sdk::proto::{ResponseEnvelope, u256_from_value};
use acc_sdk::types::{ChainInfo, TaskEvent, TaskRecord, UserBalance};
use acc_sdk_evm::{Message, SignerLike, phone_hash, sign_digest};
use alloy_primitives::{Address, B256, U256};
use http::{HeaderMap, StatusCode};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::error::ClientError;

/// Construction parameters of a [`RelayClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    endpoints: NetworkEndpoints,
    timeout: Option<Duration>,
    headers: HeaderMap,
    http: Option<Client>,
}

impl ClientConfig {
    /// Configuration for explicit endpoints, no timeout and no extra headers.
    #[must_use]
    pub fn new(endpoints: NetworkEndpoints) -> Self {
        Self {
            endpoints,
            timeout: None,
            headers: HeaderMap::new(),
            http: None,
        }
    }

    /// Configuration for a well-known network.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if the network's URLs do not parse.
    pub fn for_network(network: NetworkType) -> Result<Self, ClientError> {
        let endpoints =
            NetworkEndpoints::try_from(network).map_err(|e| ClientError::UrlParse {
                context: "Failed to resolve network endpoints",
                source: e,
            })?;
        Ok(Self::new(endpoints))
    }

    /// Sets a timeout applied to every request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches custom headers to every request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS, pools).
    #[must_use]
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Resolved endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &NetworkEndpoints {
        &self.endpoints
    }

    /// Configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Custom headers sent with each request.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl TryFrom<NetworkType> for ClientConfig {
    type Error = ClientError;

    fn try_from(network: NetworkType) -> Result<Self, Self::Error> {
        Self::for_network(network)
    }
}

/// Which server a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Server {
    Relay,
    Save,
}

/// Endpoints, HTTP client and caches shared by the role clients.
#[derive(Debug)]
pub struct RelayClient {
    endpoints: NetworkEndpoints,
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
    /// Side-chain id; `0` until the first successful fetch.
    chain_id: AtomicU64,
    main_chain: OnceCell<ChainInfo>,
    side_chain: OnceCell<ChainInfo>,
}

impl RelayClient {
    /// Builds a client from its configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: config.http.unwrap_or_default(),
            endpoints: config.endpoints,
            headers: config.headers,
            timeout: config.timeout,
            chain_id: AtomicU64::new(0),
            main_chain: OnceCell::new(),
            side_chain: OnceCell::new(),
        }
    }

    /// Builds a client for a well-known network with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::UrlParse`] if the network's URLs do not parse.
    pub fn for_network(network: NetworkType) -> Result<Self, ClientError> {
        Ok(Self::new(ClientConfig::for_network(network)?))
    }

    /// Resolved endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &NetworkEndpoints {
        &self.endpoints
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Side-chain id, fetched once and then served from the cache.
    ///
    /// Concurrent first calls may both fetch; the first value stored wins and
    /// every caller observes it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `chainId` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_chain_id", skip_all, err)
    )]
    pub async fn get_chain_id(&self) -> Result<u64, ClientError> {
        let cached = self.chain_id.load(Ordering::Acquire);
        if cached != 0 {
            return Ok(cached);
        }
        let url = self.url(Server::Relay, "v1/chain/side/id", &[])?;
        let data = self.get_value(url, "GET /v1/chain/side/id").await?;
        let chain_id = u64_field(data, "chainId")?;
        match self
            .chain_id
            .compare_exchange(0, chain_id, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(chain_id),
            Err(stored) => Ok(stored),
        }
    }

    /// Point and token balances of a wallet.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::MissingField`] (wrapped) if the payload lacks
    /// `point` or `token`.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_balance_account", skip(self), err)
    )]
    pub async fn get_balance_account(&self, account: Address) -> Result<UserBalance, ClientError> {
        let url = self.url(
            Server::Relay,
            "v1/ledger/balance/account",
            &[&account.to_string()],
        )?;
        let data = self
            .get_value(url, "GET /v1/ledger/balance/account")
            .await?;
        Ok(UserBalance::from_data(data)?)
    }

    /// Point and token balances attached to a phone number.
    ///
    /// # Errors
    ///
    /// Same as [`RelayClient::get_balance_account`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_balance_phone", skip_all, err)
    )]
    pub async fn get_balance_phone(&self, phone: &str) -> Result<UserBalance, ClientError> {
        let url = self.url(Server::Relay, "v1/ledger/balance/phone", &[phone.trim()])?;
        let data = self.get_value(url, "GET /v1/ledger/balance/phone").await?;
        Ok(UserBalance::from_data(data)?)
    }

    /// Point and token balances attached to a phone hash.
    ///
    /// # Errors
    ///
    /// Same as [`RelayClient::get_balance_account`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_balance_phone_hash", skip(self), err)
    )]
    pub async fn get_balance_phone_hash(&self, phone_hash: B256) -> Result<UserBalance, ClientError> {
        let url = self.url(
            Server::Relay,
            "v1/ledger/balance/phoneHash",
            &[&bytes32_to_hex(&phone_hash)],
        )?;
        let data = self
            .get_value(url, "GET /v1/ledger/balance/phoneHash")
            .await?;
        Ok(UserBalance::from_data(data)?)
    }

    /// Current ledger nonce of `account`.
    ///
    /// Never cached: each signed operation reads it right before signing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `nonce` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_ledger_nonce_of", skip(self), err)
    )]
    pub async fn get_ledger_nonce_of(&self, account: Address) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/ledger/nonce", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/ledger/nonce").await?;
        Ok(u256_field(data, "nonce")?)
    }

    /// Current shop nonce of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `nonce` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_shop_nonce_of", skip(self), err)
    )]
    pub async fn get_shop_nonce_of(&self, account: Address) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/shop/nonce", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/shop/nonce").await?;
        Ok(u256_field(data, "nonce")?)
    }

    /// Hash of a phone number.
    ///
    /// Surrounding whitespace is trimmed. The empty phone is hashed locally;
    /// any other number is normalized and hashed by the relay.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `phoneHash` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_phone_hash", skip_all, err)
    )]
    pub async fn get_phone_hash(&self, phone: &str) -> Result<B256, ClientError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Ok(phone_hash(""));
        }
        let url = self.url(Server::Relay, "v1/phone/hash", &[phone])?;
        let data = self.get_value(url, "GET /v1/phone/hash").await?;
        Ok(decode_field(data, "phoneHash")?)
    }

    /// Description of the main chain, fetched once per client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    pub async fn get_chain_info_of_main_chain(&self) -> Result<ChainInfo, ClientError> {
        self.main_chain
            .get_or_try_init(|| self.fetch_chain_info("v1/chain/main/info", "GET /v1/chain/main/info"))
            .await
            .cloned()
    }

    /// Description of the side chain, fetched once per client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    pub async fn get_chain_info_of_side_chain(&self) -> Result<ChainInfo, ClientError> {
        self.side_chain
            .get_or_try_init(|| self.fetch_chain_info("v1/chain/side/info", "GET /v1/chain/side/info"))
            .await
            .cloned()
    }

    /// Chain id from the main-chain description.
    ///
    /// # Errors
    ///
    /// Same as [`RelayClient::get_chain_info_of_main_chain`].
    pub async fn get_chain_id_of_main_chain(&self) -> Result<u64, ClientError> {
        Ok(self.get_chain_info_of_main_chain().await?.network.chain_id)
    }

    /// Chain id from the side-chain description.
    ///
    /// # Errors
    ///
    /// Same as [`RelayClient::get_chain_info_of_side_chain`].
    pub async fn get_chain_id_of_side_chain(&self) -> Result<u64, ClientError> {
        Ok(self.get_chain_info_of_side_chain().await?.network.chain_id)
    }

    /// Token nonce of `account` on the main chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `nonce` is missing.
    pub async fn get_nonce_of_main_chain_token(&self, account: Address) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/token/main/nonce", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/token/main/nonce").await?;
        Ok(u256_field(data, "nonce")?)
    }

    /// Token balance of `account` on the main chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `balance` is missing.
    pub async fn get_balance_of_main_chain_token(
        &self,
        account: Address,
    ) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/token/main/balance", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/token/main/balance").await?;
        Ok(u256_field(data, "balance")?)
    }

    /// Token nonce of `account` on the side chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `nonce` is missing.
    pub async fn get_nonce_of_side_chain_token(&self, account: Address) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/token/side/nonce", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/token/side/nonce").await?;
        Ok(u256_field(data, "nonce")?)
    }

    /// Token balance of `account` on the side chain.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `balance` is missing.
    pub async fn get_balance_of_side_chain_token(
        &self,
        account: Address,
    ) -> Result<U256, ClientError> {
        let url = self.url(Server::Relay, "v1/token/side/balance", &[&account.to_string()])?;
        let data = self.get_value(url, "GET /v1/token/side/balance").await?;
        Ok(u256_field(data, "balance")?)
    }

    /// Converts `amount` from one currency to another at the relay's rate.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `amount` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.convert_currency", skip(self), err)
    )]
    pub async fn convert_currency(
        &self,
        amount: U256,
        from: &str,
        to: &str,
    ) -> Result<U256, ClientError> {
        let mut url = self.url(Server::Relay, "v1/currency/convert", &[])?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("from", from.trim())
            .append_pair("to", to.trim());
        let data = self.get_value(url, "GET /v1/currency/convert").await?;
        Ok(u256_field(data, "amount")?)
    }

    /// Sequence number of the newest task in the feed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `sequence` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_latest_task_sequence", skip_all, err)
    )]
    pub async fn get_latest_task_sequence(&self) -> Result<u64, ClientError> {
        let url = self.url(Server::Relay, "v1/task/sequence/latest", &[])?;
        let data = self.get_value(url, "GET /v1/task/sequence/latest").await?;
        Ok(u64_field(data, "sequence")?)
    }

    /// Raw task records after `sequence`, payloads not yet interpreted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is not a
    /// list of records.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_task_records", skip(self), err)
    )]
    pub async fn get_task_records(&self, sequence: u64) -> Result<Vec<TaskRecord>, ClientError> {
        let url = self.url(Server::Relay, "v1/task/list", &[&sequence.to_string()])?;
        let data = self.get_value(url, "GET /v1/task/list").await?;
        Ok(serde_json::from_value(data).map_err(ResponseError::from)?)
    }

    /// Tasks after `sequence` with their payloads decoded.
    ///
    /// # Errors
    ///
    /// Same as [`RelayClient::get_task_records`], plus
    /// [`ResponseError::Decode`] (wrapped) if any payload is malformed.
    pub async fn get_tasks(&self, sequence: u64) -> Result<Vec<TaskEvent>, ClientError> {
        self.get_task_records(sequence)
            .await?
            .into_iter()
            .map(|record| record.into_event().map_err(ClientError::from))
            .collect()
    }

    async fn fetch_chain_info(
        &self,
        path: &str,
        context: &'static str,
    ) -> Result<ChainInfo, ClientError> {
        let url = self.url(Server::Relay, path, &[])?;
        let data = self.get_value(url, context).await?;
        Ok(serde_json::from_value(data).map_err(ResponseError::from)?)
    }

    /// Joins `path` and the percent-encoded `params` onto a server base URL.
    pub(crate) fn url(
        &self,
        server: Server,
        path: &str,
        params: &[&str],
    ) -> Result<Url, ClientError> {
        let mut url = match server {
            Server::Relay => self.endpoints.relay().clone(),
            Server::Save => self.endpoints.save().clone(),
        };
        {
            let mut segments = url.path_segments_mut().map_err(|()| ClientError::UrlParse {
                context: "Base URL cannot carry a path",
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
            segments.extend(params);
        }
        Ok(url)
    }

    /// Sends a GET and unwraps the envelope payload.
    ///
    /// `context` is a human-readable identifier used in tracing and error messages (e.g. `"GET /v1/ledger/nonce"`).
    pub(crate) async fn get_value(
        &self,
        url: Url,
        context: &'static str,
    ) -> Result<Value, ClientError> {
        let result = self.send(self.client.get(url), context).await;
        record_result_on_span(&result);
        result
    }

    /// Sends a JSON POST and unwraps the envelope payload.
    ///
    /// `context` is a human-readable identifier used in tracing and error messages (e.g. `"POST /v2/payment/new/open"`).
    pub(crate) async fn post_value<T>(
        &self,
        url: Url,
        context: &'static str,
        payload: &T,
    ) -> Result<Value, ClientError>
    where
        T: Serialize + Sync + ?Sized,
    {
        let result = self
            .send(self.client.post(url).json(payload), context)
            .await;
        record_result_on_span(&result);
        result
    }

    async fn send(&self, req: RequestBuilder, context: &'static str) -> Result<Value, ClientError> {
        let mut req = req;
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| ClientError::Http { context, source: e })?;

        let envelope = if http_response.status() == StatusCode::OK {
            http_response
                .json::<ResponseEnvelope>()
                .await
                .map_err(|e| ClientError::JsonDeserialization { context, source: e })?
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| ClientError::ResponseBodyRead { context, source: e })?;
            match serde_json::from_str::<ResponseEnvelope>(&body) {
                Ok(envelope) if envelope.code != 0 => envelope,
                _ => {
                    return Err(ClientError::HttpStatus {
                        context,
                        status,
                        body,
                    });
                }
            }
        };
        Ok(envelope.into_data()?)
    }
}

/// Digests and signs `message` with `signer`.
pub(crate) async fn sign<S: SignerLike>(
    signer: &S,
    message: &Message<'_>,
) -> Result<String, ClientError> {
    Ok(sign_digest(signer, &message.digest()).await?)
}

/// Removes `name` from an object payload; absent and null are both missing.
pub(crate) fn take_field(mut data: Value, name: &'static str) -> Result<Value, ResponseError> {
    match data.get_mut(name).map(Value::take) {
        None | Some(Value::Null) => Err(ResponseError::MissingField(name)),
        Some(value) => Ok(value),
    }
}

pub(crate) fn decode_field<R: DeserializeOwned>(
    data: Value,
    name: &'static str,
) -> Result<R, ResponseError> {
    Ok(serde_json::from_value(take_field(data, name)?)?)
}

pub(crate) fn u256_field(data: Value, name: &'static str) -> Result<U256, ResponseError> {
    Ok(u256_from_value(&take_field(data, name)?)?)
}

pub(crate) fn u64_field(data: Value, name: &'static str) -> Result<u64, ResponseError> {
    let value = u256_field(data, name)?;
    u64::try_from(value).map_err(|_| {
        ResponseError::Decode(serde_json::Error::custom(format!(
            "{name} does not fit in 64 bits: {value}"
        )))
    })
}

/// Records the outcome of a request on a tracing span, including status and errors.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to relay failed");
        }
    }
}

/// Records the outcome of a request on a tracing span, including status and errors.
/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
