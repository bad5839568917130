//! Point provisioning by registered providers and their assistants.

use std::sync::Arc;

use acc_sdk::error::ResponseError;
use acc_sdk::proto::DecimalU256;
use acc_sdk_evm::{Message, SignerLike};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use serde::de::Error as _;
use serde_json::Value;
use serde_with::serde_as;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::client::{RelayClient, Server, decode_field, sign, take_field};
use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct AssistantRequest {
    provider: Address,
    assistant: Address,
    signature: String,
}

#[serde_as]
#[derive(Debug, Serialize)]
struct ProvideRequest<R> {
    provider: Address,
    receiver: R,
    #[serde_as(as = "DecimalU256")]
    amount: U256,
    signature: String,
}

/// Provider role: sends points to wallets and phone numbers.
///
/// The signing key is either the provider itself or an assistant it has
/// registered with [`ProviderClient::set_agent`].
#[derive(Debug, Clone)]
pub struct ProviderClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
}

impl<S: SignerLike> ProviderClient<S> {
    /// Creates a client over a shared relay context.
    pub const fn new(relay: Arc<RelayClient>, signer: S) -> Self {
        Self { relay, signer }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Whether `account` is enabled as a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `enable` is missing.
    pub async fn is_provider(&self, account: Address) -> Result<bool, ClientError> {
        let url = self
            .relay
            .url(Server::Relay, "v1/provider/status", &[&account.to_string()])?;
        let data = self.relay.get_value(url, "GET /v1/provider/status").await?;
        Ok(bool_field(data, "enable")?)
    }

    /// Registers `agent` as the assistant of the signing provider.
    ///
    /// Passing [`Address::ZERO`] clears the assistant.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.set_agent", skip(self), err)
    )]
    pub async fn set_agent(&self, agent: Address) -> Result<B256, ClientError> {
        let provider = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(provider).await?;
        let message = Message::RegisterAgent {
            account: provider,
            agent,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = AssistantRequest {
            provider,
            assistant: agent,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/provider/assistant/register", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/provider/assistant/register", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Assistant registered for `provider`, zero if none.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `assistant` is missing.
    pub async fn get_agent(&self, provider: Address) -> Result<Address, ClientError> {
        let url = self.relay.url(
            Server::Relay,
            "v1/provider/assistant",
            &[&provider.to_string()],
        )?;
        let data = self
            .relay
            .get_value(url, "GET /v1/provider/assistant")
            .await?;
        Ok(decode_field(data, "assistant")?)
    }

    /// Sends `amount` points from `provider` to the wallet `receiver`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.provide_to_address", skip(self), err)
    )]
    pub async fn provide_to_address(
        &self,
        provider: Address,
        receiver: Address,
        amount: U256,
    ) -> Result<B256, ClientError> {
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(self.signer.address()).await?;
        let message = Message::ProvideToAddress {
            provider,
            receiver,
            amount,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ProvideRequest {
            provider,
            receiver,
            amount,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/provider/send/account", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/provider/send/account", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Sends `amount` points from `provider` to the holder of `phone`.
    ///
    /// The phone number is hashed first (see [`RelayClient::get_phone_hash`]).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if hashing, signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.provide_to_phone", skip(self, phone), err)
    )]
    pub async fn provide_to_phone(
        &self,
        provider: Address,
        phone: &str,
        amount: U256,
    ) -> Result<B256, ClientError> {
        let phone_hash = self.relay.get_phone_hash(phone).await?;
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(self.signer.address()).await?;
        let message = Message::ProvideToPhone {
            provider,
            phone_hash,
            amount,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ProvideRequest {
            provider,
            receiver: phone_hash,
            amount,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/provider/send/phoneHash", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/provider/send/phoneHash", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }
}

/// Reads a flag sent either as a JSON boolean or as `"true"`/`"false"`.
fn bool_field(data: Value, name: &'static str) -> Result<bool, ResponseError> {
    match take_field(data, name)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => text.trim().parse().map_err(|_| {
            ResponseError::Decode(serde_json::Error::custom(format!(
                "{name} is not a boolean: {text:?}"
            )))
        }),
        other => Err(ResponseError::Decode(serde_json::Error::custom(format!(
            "{name} is not a boolean: {other}"
        )))),
    }
}
