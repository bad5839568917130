//! Purchase records on the save server.
//!
//! Purchases are signed by an asset key on behalf of the shop. The loyalty a
//! purchase grants is derived locally from its detail lines before signing
//! (see [`loyalty_in_transaction`]).

use std::sync::Arc;

use acc_sdk::amount::{Amount, DEFAULT_DECIMALS, zero_gwei};
use acc_sdk::error::EncodingError;
use acc_sdk::id::parse_address_or_zero;
use acc_sdk::proto::DecimalU256;
use acc_sdk::timestamp::UnixTimestamp;
use acc_sdk::types::{PurchaseDetail, SavePurchaseResponse};
use acc_sdk_evm::{Message, SignerLike};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::client::{RelayClient, Server, decode_field, sign};
use crate::error::ClientError;

/// Percent rates are sent in hundredths of a percent.
const PERCENT_DECIMALS: u8 = 2;
/// Divisor that undoes [`PERCENT_DECIMALS`] and the percent itself.
const LOYALTY_DIVISOR: u64 = 10_000;

/// A purchase to record, as entered at the point of sale.
#[derive(Debug, Clone, Copy)]
pub struct NewPurchase<'a> {
    /// Caller-supplied purchase id; retries reuse it.
    pub purchase_id: &'a str,
    /// Time of purchase.
    pub timestamp: UnixTimestamp,
    /// Seconds to wait before the loyalty is provided.
    pub waiting: u64,
    /// Total purchase amount as a decimal literal.
    pub total_amount: &'a str,
    /// Part of the total paid in cash, as a decimal literal.
    pub cash_amount: &'a str,
    /// Currency symbol.
    pub currency: &'a str,
    /// Shop where the purchase happened.
    pub shop_id: B256,
    /// Buyer wallet; empty when unknown.
    pub user_account: &'a str,
    /// Buyer phone number; empty when unknown.
    pub user_phone: &'a str,
    /// Purchased products.
    pub details: &'a [PurchaseDetail],
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseBody<'a> {
    purchase_id: &'a str,
    #[serde_as(as = "DecimalU256")]
    cash_amount: U256,
    #[serde_as(as = "DecimalU256")]
    loyalty: U256,
    currency: &'a str,
    shop_id: B256,
    user_account: Address,
    user_phone_hash: B256,
    sender: Address,
    purchase_signature: String,
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OthersBody {
    #[serde_as(as = "DecimalU256")]
    total_amount: U256,
    #[serde_as(as = "DisplayFromStr")]
    timestamp: UnixTimestamp,
    #[serde_as(as = "DisplayFromStr")]
    waiting: u64,
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetailBody<'a> {
    product_id: &'a str,
    #[serde_as(as = "DecimalU256")]
    amount: U256,
    #[serde_as(as = "DecimalU256")]
    provide_percent: U256,
}

#[derive(Debug, Serialize)]
struct SaveNewPurchaseRequest<'a> {
    purchase: PurchaseBody<'a>,
    others: OthersBody,
    details: Vec<DetailBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelPurchaseBody<'a> {
    purchase_id: &'a str,
    sender: Address,
    purchase_signature: String,
}

#[derive(Debug, Serialize)]
struct CancelOthersBody {
    timestamp: UnixTimestamp,
    waiting: u64,
}

#[derive(Debug, Serialize)]
struct SaveCancelPurchaseRequest<'a> {
    purchase: CancelPurchaseBody<'a>,
    others: CancelOthersBody,
}

/// Records purchases and their cancellations on the save server.
#[derive(Debug, Clone)]
pub struct SavePurchaseClient<S> {
    relay: Arc<RelayClient>,
    signer: S,
    asset: Address,
}

impl<S: SignerLike> SavePurchaseClient<S> {
    /// Creates a client that records purchases as `asset`.
    pub const fn new(relay: Arc<RelayClient>, signer: S, asset: Address) -> Self {
        Self {
            relay,
            signer,
            asset,
        }
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Asset address sent as the purchase sender.
    pub const fn asset(&self) -> Address {
        self.asset
    }

    /// Records a purchase and the loyalty it grants.
    ///
    /// An empty `user_account` is recorded as the zero address.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encoding`] for malformed amounts or accounts and
    /// [`ClientError`] if hashing, signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.save.new_purchase", skip_all, fields(purchase_id = purchase.purchase_id), err)
    )]
    pub async fn save_new_purchase(
        &self,
        purchase: &NewPurchase<'_>,
    ) -> Result<SavePurchaseResponse, ClientError> {
        let user_account = parse_address_or_zero(purchase.user_account)?;
        let cash_amount = Amount::make(purchase.cash_amount, DEFAULT_DECIMALS)?.value();
        let total_amount = Amount::make(purchase.total_amount, DEFAULT_DECIMALS)?.value();
        let details = detail_bodies(purchase.details)?;
        let loyalty = loyalty_of(cash_amount, total_amount, &details)?;
        let user_phone_hash = self.relay.get_phone_hash(purchase.user_phone).await?;
        let chain_id = self.relay.get_chain_id().await?;

        let message = Message::NewPurchase {
            purchase_id: purchase.purchase_id,
            cash_amount,
            loyalty,
            currency: purchase.currency,
            shop_id: purchase.shop_id,
            account: user_account,
            phone_hash: user_phone_hash,
            sender: self.asset,
            chain_id,
        };
        let purchase_signature = sign(&self.signer, &message).await?;
        let body = SaveNewPurchaseRequest {
            purchase: PurchaseBody {
                purchase_id: purchase.purchase_id,
                cash_amount,
                loyalty,
                currency: purchase.currency,
                shop_id: purchase.shop_id,
                user_account,
                user_phone_hash,
                sender: self.asset,
                purchase_signature,
            },
            others: OthersBody {
                total_amount,
                timestamp: purchase.timestamp,
                waiting: purchase.waiting,
            },
            details,
        };
        let url = self.relay.url(Server::Save, "v2/tx/purchase/new", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/tx/purchase/new", &body)
            .await?;
        Ok(decode_field(data, "tx")?)
    }

    /// Records the cancellation of a purchase saved earlier.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if signing or the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "acc.save.cancel_purchase", skip(self), err)
    )]
    pub async fn save_cancel_purchase(
        &self,
        purchase_id: &str,
        timestamp: UnixTimestamp,
        waiting: u64,
    ) -> Result<SavePurchaseResponse, ClientError> {
        let chain_id = self.relay.get_chain_id().await?;
        let message = Message::CancelPurchase {
            purchase_id,
            sender: self.asset,
            chain_id,
        };
        let purchase_signature = sign(&self.signer, &message).await?;
        let body = SaveCancelPurchaseRequest {
            purchase: CancelPurchaseBody {
                purchase_id,
                sender: self.asset,
                purchase_signature,
            },
            others: CancelOthersBody { timestamp, waiting },
        };
        let url = self.relay.url(Server::Save, "v2/tx/purchase/cancel", &[])?;
        let data = self
            .relay
            .post_value(url, "POST /v2/tx/purchase/cancel", &body)
            .await?;
        Ok(decode_field(data, "tx")?)
    }
}

/// Loyalty granted by a purchase, in base units.
///
/// Each detail contributes `amount * percent`, with the percent truncated to
/// hundredths; the sum is prorated by the cash share of the total and
/// truncated to a multiple of `10^9`. A zero
/// `cash_amount` or `total_amount` grants nothing.
///
/// # Errors
///
/// Returns [`EncodingError`] if a detail amount or percent is malformed or the
/// intermediate product overflows 256 bits.
pub fn loyalty_in_transaction(
    cash_amount: U256,
    total_amount: U256,
    details: &[PurchaseDetail],
) -> Result<U256, EncodingError> {
    loyalty_of(cash_amount, total_amount, &detail_bodies(details)?)
}

fn detail_bodies(details: &[PurchaseDetail]) -> Result<Vec<DetailBody<'_>>, EncodingError> {
    details
        .iter()
        .map(|detail| {
            Ok(DetailBody {
                product_id: &detail.product_id,
                amount: Amount::make(&detail.amount, DEFAULT_DECIMALS)?.value(),
                provide_percent: Amount::make(&detail.provide_percent, PERCENT_DECIMALS)?
                    .value(),
            })
        })
        .collect()
}

fn loyalty_of(
    cash_amount: U256,
    total_amount: U256,
    details: &[DetailBody<'_>],
) -> Result<U256, EncodingError> {
    if total_amount.is_zero() || cash_amount.is_zero() {
        return Ok(U256::ZERO);
    }
    let overflow = || EncodingError::Overflow("loyalty".to_owned());
    let sum = details.iter().try_fold(U256::ZERO, |sum, detail| {
        detail
            .amount
            .checked_mul(detail.provide_percent)
            .and_then(|part| sum.checked_add(part))
            .ok_or_else(overflow)
    })?;
    let prorated = sum.checked_mul(cash_amount).ok_or_else(overflow)? / total_amount;
    Ok(zero_gwei(prorated / U256::from(LOYALTY_DIVISOR)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client_for, mount_chain_id, ok};
    use acc_sdk_evm::{phone_hash, recover_signer, signer_from_private_key};
    use alloy_primitives::b256;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer};

    const KEY: &str = "0x70438bc3ed02b5e4b76d496625cb7c06d6b7bf4362295b16fdfe91a046d4586c";
    const SHOP_ID: B256 = b256!("0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874");

    fn ether(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u8).pow(U256::from(18u8))
    }

    fn asset() -> Address {
        "0x4501F7aF010Cef3DcEaAfbc7Bfb2B39dE57df54d".parse().unwrap()
    }

    async fn posted_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        let post = requests
            .iter()
            .find(|request| request.method.as_str() == "POST")
            .unwrap();
        serde_json::from_slice(&post.body).unwrap()
    }

    #[test]
    fn loyalty_is_weighted_by_rate() {
        let details = [
            PurchaseDetail::new("P1", "1000", "10"),
            PurchaseDetail::new("P2", "500", "5"),
        ];
        assert_eq!(
            loyalty_in_transaction(ether(1500), ether(1500), &details).unwrap(),
            ether(125)
        );
        assert_eq!(
            loyalty_in_transaction(ether(750), ether(1500), &details).unwrap(),
            U256::from(62_500_000_000_000_000_000u128)
        );
    }

    #[test]
    fn fractional_rates_are_sent_in_hundredths() {
        let details = [
            PurchaseDetail::new("P1", "1000", "2.5"),
            PurchaseDetail::new("P2", "500", "10"),
            PurchaseDetail::new("P3", "200", "1.255"),
        ];
        let bodies = serde_json::to_value(detail_bodies(&details).unwrap()).unwrap();
        assert_eq!(bodies[0]["providePercent"], json!("250"));
        assert_eq!(bodies[1]["providePercent"], json!("1000"));
        assert_eq!(bodies[2]["providePercent"], json!("125"));
    }

    #[test]
    fn loyalty_of_mixed_rate_basket() {
        let details = [
            PurchaseDetail::new("P1", "1000", "2.5"),
            PurchaseDetail::new("P2", "500", "10"),
            PurchaseDetail::new("P3", "200", "1.25"),
        ];
        // (1000 * 250 + 500 * 1000 + 200 * 125) * 1000 / 1700 / 10000, in ether
        assert_eq!(
            loyalty_in_transaction(ether(1000), ether(1700), &details).unwrap(),
            U256::from(45_588_235_294_000_000_000u128)
        );
    }

    #[test]
    fn malformed_percent_is_rejected() {
        let details = [PurchaseDetail::new("P1", "1000", "ten")];
        assert!(matches!(
            loyalty_in_transaction(ether(1), ether(1), &details),
            Err(EncodingError::InvalidFormat(_))
        ));
    }

    #[test]
    fn loyalty_is_truncated_to_gwei() {
        let details = [PurchaseDetail::new("P1", "1", "10")];
        assert_eq!(
            loyalty_in_transaction(ether(1), ether(3), &details).unwrap(),
            U256::from(33_333_333_000_000_000u64)
        );
    }

    #[test]
    fn zero_cash_or_total_grants_nothing() {
        let details = [PurchaseDetail::new("P1", "1000", "10")];
        assert_eq!(
            loyalty_in_transaction(U256::ZERO, ether(1000), &details).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            loyalty_in_transaction(ether(1000), U256::ZERO, &details).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn malformed_detail_amount_is_rejected() {
        let details = [PurchaseDetail::new("P1", "1.0.0", "10")];
        assert!(matches!(
            loyalty_in_transaction(ether(1), ether(1), &details),
            Err(EncodingError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn new_purchase_body_and_signature() {
        let server = MockServer::start().await;
        mount_chain_id(&server, 24680).await;
        Mock::given(method("POST"))
            .and(path("/v2/tx/purchase/new"))
            .respond_with(ok(json!({
                "tx": {"type": 0, "sequence": "7", "purchaseId": "P000001"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SavePurchaseClient::new(
            Arc::new(client_for(&server)),
            signer_from_private_key(KEY).unwrap(),
            asset(),
        );
        let details = [PurchaseDetail::new("PD001", "1000", "10")];
        let receipt = client
            .save_new_purchase(&NewPurchase {
                purchase_id: "P000001",
                timestamp: UnixTimestamp::from_secs(1_700_000_000),
                waiting: 0,
                total_amount: "1000",
                cash_amount: "1000",
                currency: "php",
                shop_id: SHOP_ID,
                user_account: "",
                user_phone: "",
                details: &details,
            })
            .await
            .unwrap();
        assert_eq!(receipt.sequence, 7);
        assert_eq!(receipt.purchase_id, "P000001");

        let body = posted_body(&server).await;
        let purchase = &body["purchase"];
        assert_eq!(purchase["loyalty"], json!("100000000000000000000"));
        assert_eq!(purchase["userAccount"], json!(Address::ZERO));
        assert_eq!(purchase["userPhoneHash"], json!(phone_hash("")));
        assert_eq!(body["others"]["timestamp"], json!("1700000000"));
        assert_eq!(body["others"]["waiting"], json!("0"));
        assert_eq!(body["details"][0]["providePercent"], json!("1000"));
        assert_eq!(body["details"][0]["amount"], json!("1000000000000000000000"));

        let digest = Message::NewPurchase {
            purchase_id: "P000001",
            cash_amount: ether(1000),
            loyalty: ether(100),
            currency: "php",
            shop_id: SHOP_ID,
            account: Address::ZERO,
            phone_hash: phone_hash(""),
            sender: asset(),
            chain_id: 24680,
        }
        .digest();
        assert_eq!(
            recover_signer(&digest, purchase["purchaseSignature"].as_str().unwrap()).unwrap(),
            client.address()
        );
    }

    #[tokio::test]
    async fn cancel_sends_numeric_others() {
        let server = MockServer::start().await;
        mount_chain_id(&server, 24680).await;
        Mock::given(method("POST"))
            .and(path("/v2/tx/purchase/cancel"))
            .respond_with(ok(json!({
                "tx": {"type": "1", "sequence": 8, "purchaseId": "P000001"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SavePurchaseClient::new(
            Arc::new(client_for(&server)),
            signer_from_private_key(KEY).unwrap(),
            asset(),
        );
        let receipt = client
            .save_cancel_purchase("P000001", UnixTimestamp::from_secs(1_700_000_100), 0)
            .await
            .unwrap();
        assert_eq!(receipt.kind, 1);

        let body = posted_body(&server).await;
        assert_eq!(body["others"]["timestamp"], json!(1_700_000_100u64));
        assert_eq!(body["purchase"]["sender"], json!(asset()));
    }
}
