//! Shop settlement: collecting from client shops, refunds and withdrawals.
//!
//! A shop may designate another shop as its settlement manager. The manager
//! then collects the settled amounts of all its client shops in one signed
//! request and refunds or withdraws them. Refund and withdrawal rights can be
//! delegated to agents.
//!
//! Refund and withdrawal amounts are truncated to a multiple of `10^9` base
//! units before signing.

use std::sync::Arc;

use acc_sdk::amount::zero_gwei;
use acc_sdk::error::ResponseError;
use acc_sdk::id::{bytes32_to_hex, parse_bytes32};
use acc_sdk::proto::DecimalU256;
use acc_sdk::timestamp::UnixTimestamp;
use acc_sdk::types::{ShopData, ShopRefundableData};
use acc_sdk_evm::{Message, SignerLike};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use serde_json::Value;
use serde_with::serde_as;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::client::{RelayClient, Server, decode_field, sign, u64_field};
use crate::error::ClientError;

/// Validity window of a withdrawal signature, in seconds.
pub const WITHDRAW_EXPIRY_SECS: u64 = 1800;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectRequest {
    shop_id: B256,
    account: Address,
    clients: String,
    signature: String,
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundRequest {
    shop_id: B256,
    account: Address,
    #[serde_as(as = "DecimalU256")]
    amount: U256,
    signature: String,
}

#[serde_as]
#[derive(Debug, Serialize)]
struct WithdrawRequest {
    account: Address,
    #[serde_as(as = "DecimalU256")]
    amount: U256,
    expiry: UnixTimestamp,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManagerRequest {
    shop_id: B256,
    account: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    manager_id: Option<B256>,
    signature: String,
}

#[derive(Debug, Serialize)]
struct AgentRequest {
    account: Address,
    agent: Address,
    signature: String,
}

/// Kind of delegated authority an agent holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentKind {
    Refund,
    Withdrawal,
}

impl AgentKind {
    const fn path(self) -> &'static str {
        match self {
            Self::Refund => "v1/agent/refund",
            Self::Withdrawal => "v1/agent/withdrawal",
        }
    }

    const fn get_context(self) -> &'static str {
        match self {
            Self::Refund => "GET /v1/agent/refund",
            Self::Withdrawal => "GET /v1/agent/withdrawal",
        }
    }

    const fn post_context(self) -> &'static str {
        match self {
            Self::Refund => "POST /v1/agent/refund",
            Self::Withdrawal => "POST /v1/agent/withdrawal",
        }
    }
}

/// Settlement operations of one shop, signed by its owner or agent.
#[derive(Debug, Clone)]
pub struct SettlementClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
    shop_id: B256,
}

impl<S: SignerLike> SettlementClient<S> {
    /// Creates a client for `shop_id` over a shared relay context.
    pub const fn new(relay: Arc<RelayClient>, signer: S, shop_id: B256) -> Self {
        Self {
            relay,
            signer,
            shop_id,
        }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The shop this client acts for.
    pub const fn shop_id(&self) -> B256 {
        self.shop_id
    }

    /// Number of client shops managed by this shop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `length` is missing.
    pub async fn get_settlement_client_length(&self) -> Result<u64, ClientError> {
        let url = self.relay.url(
            Server::Relay,
            "v1/shop/settlement/client/length",
            &[&bytes32_to_hex(&self.shop_id)],
        )?;
        let data = self
            .relay
            .get_value(url, "GET /v1/shop/settlement/client/length")
            .await?;
        Ok(u64_field(data, "length")?)
    }

    /// Client shops in `start_index..end_index`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails, `clients` is missing or an
    /// entry is not a 32-byte id.
    pub async fn get_settlement_client_list(
        &self,
        start_index: u64,
        end_index: u64,
    ) -> Result<Vec<B256>, ClientError> {
        let mut url = self.relay.url(
            Server::Relay,
            "v1/shop/settlement/client/list",
            &[&bytes32_to_hex(&self.shop_id)],
        )?;
        url.query_pairs_mut()
            .append_pair("startIndex", &start_index.to_string())
            .append_pair("endIndex", &end_index.to_string());
        let data = self
            .relay
            .get_value(url, "GET /v1/shop/settlement/client/list")
            .await?;
        let clients: Vec<String> = decode_field(data, "clients")?;
        Ok(clients
            .iter()
            .map(|client| parse_bytes32(client))
            .collect::<Result<_, _>>()?)
    }

    /// Collects the settled amounts of `clients` into this (manager) shop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.collect_settlement", skip(self), err)
    )]
    pub async fn collect_settlement_amount_multi_client(
        &self,
        clients: &[B256],
    ) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_shop_nonce_of(account).await?;
        let message = Message::CollectSettlement {
            manager_id: self.shop_id,
            client_ids: clients,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = CollectRequest {
            shop_id: self.shop_id,
            account,
            clients: clients
                .iter()
                .map(bytes32_to_hex)
                .collect::<Vec<_>>()
                .join(","),
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/shop/settlement/collect", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/shop/settlement/collect", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Ledger state of this shop, including its settled amount.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    pub async fn get_shop_info(&self) -> Result<ShopData, ClientError> {
        let url = self.relay.url(
            Server::Relay,
            "v1/shop/info",
            &[&bytes32_to_hex(&self.shop_id)],
        )?;
        let data = self.relay.get_value(url, "GET /v1/shop/info").await?;
        decode(data)
    }

    /// Owner wallet of this shop.
    ///
    /// # Errors
    ///
    /// Same as [`SettlementClient::get_shop_info`].
    pub async fn get_account_of_shop_owner(&self) -> Result<Address, ClientError> {
        Ok(self.get_shop_info().await?.account)
    }

    /// Amount this shop can currently refund.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    pub async fn get_refundable(&self) -> Result<ShopRefundableData, ClientError> {
        let url = self.relay.url(
            Server::Relay,
            "v1/shop/refundable",
            &[&bytes32_to_hex(&self.shop_id)],
        )?;
        let data = self
            .relay
            .get_value(url, "GET /v1/shop/refundable")
            .await?;
        decode(data)
    }

    /// Refunds `amount`, truncated to a multiple of `10^9`, to the shop owner.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.refund", skip(self), err)
    )]
    pub async fn refund(&self, amount: U256) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let amount = zero_gwei(amount);
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_shop_nonce_of(account).await?;
        let message = Message::ShopRefund {
            shop_id: self.shop_id,
            amount,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = RefundRequest {
            shop_id: self.shop_id,
            account,
            amount,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v1/shop/refund", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/shop/refund", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Withdraws `amount`, truncated to a multiple of `10^9`, to the main
    /// chain through the loyalty bridge.
    ///
    /// The signature expires [`WITHDRAW_EXPIRY_SECS`] seconds from now.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.withdraw", skip(self), err)
    )]
    pub async fn withdraw(&self, amount: U256) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let chain_info = self.relay.get_chain_info_of_side_chain().await?;
        let amount = zero_gwei(amount);
        let expiry = UnixTimestamp::now() + WITHDRAW_EXPIRY_SECS;
        let nonce = self.relay.get_ledger_nonce_of(account).await?;
        let message = Message::Transfer {
            chain_id: chain_info.network.chain_id,
            token: chain_info.contract.token,
            from: account,
            to: chain_info.contract.loyalty_bridge,
            amount,
            nonce,
            expiry: expiry.as_secs(),
        };
        let signature = sign(&self.signer, &message).await?;
        let body = WithdrawRequest {
            account,
            amount,
            expiry,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/ledger/withdraw_via_bridge", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/ledger/withdraw_via_bridge", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Settlement manager of this shop, zero if none.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `managerId` is missing.
    pub async fn get_settlement_manager(&self) -> Result<B256, ClientError> {
        let url = self.relay.url(
            Server::Relay,
            "v1/shop/settlement/manager/get",
            &[&bytes32_to_hex(&self.shop_id)],
        )?;
        let data = self
            .relay
            .get_value(url, "GET /v1/shop/settlement/manager/get")
            .await?;
        Ok(decode_field(data, "managerId")?)
    }

    /// Designates `manager_id` as the settlement manager of this shop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.set_settlement_manager", skip(self), err)
    )]
    pub async fn set_settlement_manager(&self, manager_id: B256) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_shop_nonce_of(account).await?;
        let message = Message::SetSettlementManager {
            shop_id: self.shop_id,
            manager_id,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ManagerRequest {
            shop_id: self.shop_id,
            account,
            manager_id: Some(manager_id),
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/shop/settlement/manager/set", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/shop/settlement/manager/set", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Removes the settlement manager of this shop.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.remove_settlement_manager", skip(self), err)
    )]
    pub async fn remove_settlement_manager(&self) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_shop_nonce_of(account).await?;
        let message = Message::RemoveSettlementManager {
            shop_id: self.shop_id,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ManagerRequest {
            shop_id: self.shop_id,
            account,
            manager_id: None,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v1/shop/settlement/manager/remove", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v1/shop/settlement/manager/remove", &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }

    /// Refund agent of `account`, zero if none.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `agent` is missing.
    pub async fn get_agent_of_refund(&self, account: Address) -> Result<Address, ClientError> {
        self.get_agent(AgentKind::Refund, account).await
    }

    /// Registers `agent` to refund on behalf of the signer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    pub async fn set_agent_of_refund(&self, agent: Address) -> Result<B256, ClientError> {
        self.set_agent(AgentKind::Refund, agent).await
    }

    /// Withdrawal agent of `account`, zero if none.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or `agent` is missing.
    pub async fn get_agent_of_withdrawal(&self, account: Address) -> Result<Address, ClientError> {
        self.get_agent(AgentKind::Withdrawal, account).await
    }

    /// Registers `agent` to withdraw on behalf of the signer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    pub async fn set_agent_of_withdrawal(&self, agent: Address) -> Result<B256, ClientError> {
        self.set_agent(AgentKind::Withdrawal, agent).await
    }

    async fn get_agent(&self, kind: AgentKind, account: Address) -> Result<Address, ClientError> {
        let url = self
            .relay
            .url(Server::Relay, kind.path(), &[&account.to_string()])?;
        let data = self.relay.get_value(url, kind.get_context()).await?;
        Ok(decode_field(data, "agent")?)
    }

    async fn set_agent(&self, kind: AgentKind, agent: Address) -> Result<B256, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(account).await?;
        let message = Message::RegisterAgent {
            account,
            agent,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = AgentRequest {
            account,
            agent,
            signature,
        };
        let url = self.relay.url(Server::Relay, kind.path(), &[])?;
        let data = self
            .relay
            .post_value(url, kind.post_context(), &body)
            .await?;
        Ok(decode_field(data, "txHash")?)
    }
}

fn decode<R: serde::de::DeserializeOwned>(data: Value) -> Result<R, ClientError> {
    Ok(serde_json::from_value(data).map_err(ResponseError::from)?)
}
