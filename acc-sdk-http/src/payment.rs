//! Payment flows.
//!
//! A payment moves through two signed phases on each side:
//!
//! 1. the terminal (shop key) opens it with [`PaymentClient::open_new_payment`]
//! 2. the user approves or rejects it with [`UserPaymentClient::approve_new_payment`]
//! 3. the terminal closes it with [`PaymentClient::close_new_payment`]
//!
//! Cancellation mirrors this with [`PaymentClient::open_cancel_payment`],
//! [`ShopPaymentClient::approve_cancel_payment`] and
//! [`PaymentClient::close_cancel_payment`]. Progress is observable through the
//! task feed (see [`crate::event`]).

use std::sync::Arc;

use acc_sdk::id::bytes32_to_hex;
use acc_sdk::proto::DecimalU256;
use acc_sdk::types::{PaymentInfo, PaymentTaskItem, PaymentTaskItemShort, TaskEvent};
use acc_sdk_evm::{Message, SignerLike};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use serde_json::Value;
use serde_with::serde_as;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::client::{RelayClient, Server, decode_field, sign};
use crate::error::ClientError;

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenNewPaymentRequest<'a> {
    purchase_id: &'a str,
    #[serde_as(as = "DecimalU256")]
    amount: U256,
    currency: &'a str,
    shop_id: B256,
    account: Address,
    terminal_id: &'a str,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosePaymentRequest {
    payment_id: String,
    confirm: bool,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenCancelPaymentRequest<'a> {
    payment_id: String,
    terminal_id: &'a str,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRequest {
    payment_id: B256,
    approval: bool,
    signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRequest {
    account: Address,
    signature: String,
}

/// Terminal side of the payment flow, signing with the shop's key.
#[derive(Debug, Clone)]
pub struct PaymentClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
}

impl<S: SignerLike> PaymentClient<S> {
    /// Creates a client over a shared relay context.
    pub const fn new(relay: Arc<RelayClient>, signer: S) -> Self {
        Self { relay, signer }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The shared relay context.
    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    /// Quote of what paying `amount` from `account` will cost in points.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_payment_info", skip(self), err)
    )]
    pub async fn get_payment_info(
        &self,
        account: Address,
        amount: U256,
        currency: &str,
    ) -> Result<PaymentInfo, ClientError> {
        let mut url = self.relay.url(Server::Relay, "v2/payment/info", &[])?;
        url.query_pairs_mut()
            .append_pair("account", &account.to_string())
            .append_pair("amount", &amount.to_string())
            .append_pair("currency", currency.trim());
        let data = self.relay.get_value(url, "GET /v2/payment/info").await?;
        decode(data)
    }

    /// Opens a new payment of `amount` from `account` at `shop_id`.
    ///
    /// `account` is the user's wallet or a temporary account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.open_new_payment", skip(self), err)
    )]
    pub async fn open_new_payment(
        &self,
        purchase_id: &str,
        account: Address,
        amount: U256,
        currency: &str,
        shop_id: B256,
        terminal_id: &str,
    ) -> Result<PaymentTaskItem, ClientError> {
        let message = Message::OpenNewPayment {
            purchase_id,
            amount,
            currency,
            shop_id,
            account,
            terminal_id,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = OpenNewPaymentRequest {
            purchase_id,
            amount,
            currency,
            shop_id,
            account,
            terminal_id,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v2/payment/new/open", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/new/open", &body)
            .await?;
        decode(data)
    }

    /// Closes a new payment; `confirm == false` cancels it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.close_new_payment", skip(self), err)
    )]
    pub async fn close_new_payment(
        &self,
        payment_id: B256,
        confirm: bool,
    ) -> Result<PaymentTaskItem, ClientError> {
        let payment_id = bytes32_to_hex(&payment_id);
        let message = Message::CloseNewPayment {
            payment_id: &payment_id,
            confirm,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ClosePaymentRequest {
            payment_id,
            confirm,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v2/payment/new/close", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/new/close", &body)
            .await?;
        decode(data)
    }

    /// Starts cancelling a completed payment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.open_cancel_payment", skip(self), err)
    )]
    pub async fn open_cancel_payment(
        &self,
        payment_id: B256,
        terminal_id: &str,
    ) -> Result<PaymentTaskItem, ClientError> {
        let payment_id = bytes32_to_hex(&payment_id);
        let message = Message::OpenCancelPayment {
            payment_id: &payment_id,
            terminal_id,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = OpenCancelPaymentRequest {
            payment_id,
            terminal_id,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v2/payment/cancel/open", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/cancel/open", &body)
            .await?;
        decode(data)
    }

    /// Closes a cancellation; `confirm == false` keeps the payment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.close_cancel_payment", skip(self), err)
    )]
    pub async fn close_cancel_payment(
        &self,
        payment_id: B256,
        confirm: bool,
    ) -> Result<PaymentTaskItem, ClientError> {
        let payment_id = bytes32_to_hex(&payment_id);
        let message = Message::CloseCancelPayment {
            payment_id: &payment_id,
            confirm,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ClosePaymentRequest {
            payment_id,
            confirm,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v2/payment/cancel/close", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/cancel/close", &body)
            .await?;
        decode(data)
    }

    /// Current snapshot of a payment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the request fails or the payload is malformed.
    pub async fn get_payment_item(&self, payment_id: B256) -> Result<PaymentTaskItem, ClientError> {
        let mut url = self.relay.url(Server::Relay, "v2/payment/item", &[])?;
        url.query_pairs_mut()
            .append_pair("paymentId", &bytes32_to_hex(&payment_id));
        let data = self.relay.get_value(url, "GET /v2/payment/item").await?;
        decode(data)
    }

    /// Sequence number of the newest task in the feed.
    ///
    /// # Errors
    ///
    /// See [`RelayClient::get_latest_task_sequence`].
    pub async fn get_latest_task_sequence(&self) -> Result<u64, ClientError> {
        self.relay.get_latest_task_sequence().await
    }

    /// Tasks after `sequence`.
    ///
    /// # Errors
    ///
    /// See [`RelayClient::get_tasks`].
    pub async fn get_tasks(&self, sequence: u64) -> Result<Vec<TaskEvent>, ClientError> {
        self.relay.get_tasks(sequence).await
    }
}

/// User side of the payment flow, signing with the user's wallet key.
#[derive(Debug, Clone)]
pub struct UserPaymentClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
}

impl<S: SignerLike> UserPaymentClient<S> {
    /// Creates a client over a shared relay context.
    pub const fn new(relay: Arc<RelayClient>, signer: S) -> Self {
        Self { relay, signer }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Requests a short-lived account a terminal can open a payment against.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails, or
    /// `temporaryAccount` is missing.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.get_temporary_account", skip_all, err)
    )]
    pub async fn get_temporary_account(&self) -> Result<Address, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(account).await?;
        let message = Message::TemporaryAccount {
            account,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = AccountRequest { account, signature };
        let url = self
            .relay
            .url(Server::Relay, "v2/payment/account/temporary", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/account/temporary", &body)
            .await?;
        Ok(decode_field(data, "temporaryAccount")?)
    }

    /// Approves (or rejects) a payment opened against this user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.approve_new_payment", skip(self), err)
    )]
    pub async fn approve_new_payment(
        &self,
        payment_id: B256,
        purchase_id: &str,
        amount: U256,
        currency: &str,
        shop_id: B256,
        approval: bool,
    ) -> Result<PaymentTaskItemShort, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(account).await?;
        let message = Message::NewPaymentApproval {
            payment_id,
            purchase_id,
            amount,
            currency,
            shop_id,
            account,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ApprovalRequest {
            payment_id,
            approval,
            signature,
        };
        let url = self.relay.url(Server::Relay, "v2/payment/new/approval", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/new/approval", &body)
            .await?;
        decode(data)
    }
}

/// Shop-owner side of the cancellation flow.
#[derive(Debug, Clone)]
pub struct ShopPaymentClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
}

impl<S: SignerLike> ShopPaymentClient<S> {
    /// Creates a client over a shared relay context.
    pub const fn new(relay: Arc<RelayClient>, signer: S) -> Self {
        Self { relay, signer }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Approves (or rejects) the cancellation of a payment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.relay.approve_cancel_payment", skip(self), err)
    )]
    pub async fn approve_cancel_payment(
        &self,
        payment_id: B256,
        purchase_id: &str,
        approval: bool,
    ) -> Result<PaymentTaskItemShort, ClientError> {
        let account = self.signer.address();
        let chain_id = self.relay.get_chain_id().await?;
        let nonce = self.relay.get_ledger_nonce_of(account).await?;
        let message = Message::CancelPaymentApproval {
            payment_id,
            purchase_id,
            account,
            chain_id,
            nonce,
        };
        let signature = sign(&self.signer, &message).await?;
        let body = ApprovalRequest {
            payment_id,
            approval,
            signature,
        };
        let url = self
            .relay
            .url(Server::Relay, "v2/payment/cancel/approval", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/payment/cancel/approval", &body)
            .await?;
        decode(data)
    }
}

fn decode<R: serde::de::DeserializeOwned>(data: Value) -> Result<R, ClientError> {
    Ok(serde_json::from_value(data).map_err(acc_sdk::error::ResponseError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client_for, mount_chain_id, ok};
    use acc_sdk_evm::{recover_signer, signer_from_private_key};
    use alloy_primitives::b256;
    use alloy_signer_local::PrivateKeySigner;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SHOP_KEY: &str = "0x70438bc3ed02b5e4b76d496625cb7c06d6b7bf4362295b16fdfe91a046d4586c";
    const USER_KEY: &str = "0xa0dcffca22f13363ab5d109f3a51ca99754cff4ce4add5d11ea0f3b3d1e5e4e7";
    const SHOP_ID: B256 = b256!("0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874");
    const PAYMENT_ID: B256 =
        b256!("6e3b5e0a0a1c1e1b2c4a9b0e2f0c6a8d3b1f9e2d7c5a4b3e2d1c0b9a8f7e6d5c");

    fn signer(key: &str) -> PrivateKeySigner {
        signer_from_private_key(key).unwrap()
    }

    fn payment_item(account: Address) -> Value {
        json!({
            "paymentId": bytes32_to_hex(&PAYMENT_ID),
            "purchaseId": "P00001",
            "amount": "1000000000000000000",
            "currency": "php",
            "shopId": bytes32_to_hex(&SHOP_ID),
            "account": account,
            "paidPoint": "0",
            "paidValue": "0",
            "feePoint": "0",
            "feeValue": "0",
            "totalPoint": "0",
            "totalValue": "0",
            "terminalId": "POS001",
            "paymentStatus": 11
        })
    }

    fn payment_short(account: Address) -> Value {
        json!({
            "paymentId": bytes32_to_hex(&PAYMENT_ID),
            "purchaseId": "P00001",
            "amount": "1000000000000000000",
            "currency": "php",
            "shopId": bytes32_to_hex(&SHOP_ID),
            "account": account,
            "terminalId": "POS001",
            "paymentStatus": 12
        })
    }

    async fn received_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        let request = requests
            .iter()
            .rev()
            .find(|request| request.method.as_str() == "POST")
            .unwrap();
        serde_json::from_slice(&request.body).unwrap()
    }

    #[tokio::test]
    async fn open_new_payment_sends_signed_body() {
        let server = MockServer::start().await;
        let user: Address = "0x5a3fc8990417b3e6ddcdae0e8039e798a609ef84".parse().unwrap();
        Mock::given(method("POST"))
            .and(path("/v2/payment/new/open"))
            .and(body_partial_json(json!({
                "purchaseId": "P00001",
                "amount": "1000000000000000000",
                "currency": "php",
                "shopId": bytes32_to_hex(&SHOP_ID),
                "terminalId": "POS001"
            })))
            .respond_with(ok(payment_item(user)))
            .expect(1)
            .mount(&server)
            .await;

        let shop = signer(SHOP_KEY);
        let shop_address = shop.address();
        let client = PaymentClient::new(Arc::new(client_for(&server)), shop);
        let amount = U256::from(10u8).pow(U256::from(18u8));
        let item = client
            .open_new_payment("P00001", user, amount, "php", SHOP_ID, "POS001")
            .await
            .unwrap();
        assert_eq!(item.payment_id, PAYMENT_ID);
        assert_eq!(item.payment_status, 11);

        let body = received_body(&server).await;
        let digest = Message::OpenNewPayment {
            purchase_id: "P00001",
            amount,
            currency: "php",
            shop_id: SHOP_ID,
            account: user,
            terminal_id: "POS001",
        }
        .digest();
        let signature = body["signature"].as_str().unwrap();
        assert_eq!(recover_signer(&digest, signature).unwrap(), shop_address);
    }

    #[tokio::test]
    async fn close_payment_sends_confirm_flag() {
        let server = MockServer::start().await;
        let user: Address = "0x5a3fc8990417b3e6ddcdae0e8039e798a609ef84".parse().unwrap();
        Mock::given(method("POST"))
            .and(path("/v2/payment/new/close"))
            .and(body_partial_json(json!({
                "paymentId": bytes32_to_hex(&PAYMENT_ID),
                "confirm": false
            })))
            .respond_with(ok(payment_item(user)))
            .expect(1)
            .mount(&server)
            .await;

        let client = PaymentClient::new(Arc::new(client_for(&server)), signer(SHOP_KEY));
        client.close_new_payment(PAYMENT_ID, false).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_open_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/payment/cancel/open"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 2008, "error": {"message": "not found"}})),
            )
            .mount(&server)
            .await;

        let client = PaymentClient::new(Arc::new(client_for(&server)), signer(SHOP_KEY));
        let err = client
            .open_cancel_payment(PAYMENT_ID, "POS001")
            .await
            .unwrap_err();
        assert_eq!(err.server_code(), Some(2008));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn payment_item_is_queried_by_id() {
        let server = MockServer::start().await;
        let user: Address = "0x5a3fc8990417b3e6ddcdae0e8039e798a609ef84".parse().unwrap();
        Mock::given(method("GET"))
            .and(path("/v2/payment/item"))
            .and(query_param("paymentId", bytes32_to_hex(&PAYMENT_ID)))
            .respond_with(ok(payment_item(user)))
            .mount(&server)
            .await;

        let client = PaymentClient::new(Arc::new(client_for(&server)), signer(SHOP_KEY));
        let item = client.get_payment_item(PAYMENT_ID).await.unwrap();
        assert_eq!(item.account, user);
        assert_eq!(item.terminal_id, "POS001");
    }

    #[tokio::test]
    async fn approval_signs_with_fresh_ledger_nonce() {
        let server = MockServer::start().await;
        let user = signer(USER_KEY);
        let user_address = user.address();
        mount_chain_id(&server, 24680).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/ledger/nonce/{user_address}")))
            .respond_with(ok(json!({"account": user_address, "nonce": "5"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/payment/new/approval"))
            .and(body_partial_json(json!({
                "paymentId": bytes32_to_hex(&PAYMENT_ID),
                "approval": true
            })))
            .respond_with(ok(payment_short(user_address)))
            .expect(1)
            .mount(&server)
            .await;

        let client = UserPaymentClient::new(Arc::new(client_for(&server)), user);
        let amount = U256::from(10u8).pow(U256::from(18u8));
        let item = client
            .approve_new_payment(PAYMENT_ID, "P00001", amount, "php", SHOP_ID, true)
            .await
            .unwrap();
        assert_eq!(item.payment_status, 12);

        let body = received_body(&server).await;
        let digest = Message::NewPaymentApproval {
            payment_id: PAYMENT_ID,
            purchase_id: "P00001",
            amount,
            currency: "php",
            shop_id: SHOP_ID,
            account: user_address,
            chain_id: 24680,
            nonce: U256::from(5u8),
        }
        .digest();
        let signature = body["signature"].as_str().unwrap();
        assert_eq!(recover_signer(&digest, signature).unwrap(), user_address);
    }

    #[tokio::test]
    async fn temporary_account_is_returned() {
        let server = MockServer::start().await;
        let user = signer(USER_KEY);
        let user_address = user.address();
        let temporary: Address = "0x2222222222222222222222222222222222222222".parse().unwrap();
        mount_chain_id(&server, 24680).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/ledger/nonce/{user_address}")))
            .respond_with(ok(json!({"nonce": "0"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/payment/account/temporary"))
            .respond_with(ok(json!({"temporaryAccount": temporary})))
            .mount(&server)
            .await;

        let client = UserPaymentClient::new(Arc::new(client_for(&server)), user);
        assert_eq!(client.get_temporary_account().await.unwrap(), temporary);
    }

    #[tokio::test]
    async fn cancel_approval_posts_to_cancel_endpoint() {
        let server = MockServer::start().await;
        let shop = signer(SHOP_KEY);
        let shop_address = shop.address();
        mount_chain_id(&server, 24680).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/ledger/nonce/{shop_address}")))
            .respond_with(ok(json!({"nonce": "2"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/payment/cancel/approval"))
            .and(body_partial_json(json!({"approval": false})))
            .respond_with(ok(payment_short(shop_address)))
            .expect(1)
            .mount(&server)
            .await;

        let client = ShopPaymentClient::new(Arc::new(client_for(&server)), shop);
        client
            .approve_cancel_payment(PAYMENT_ID, "P00001", false)
            .await
            .unwrap();
    }
}
