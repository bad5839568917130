//! Canonical messages signed by every operation.
//!
//! Each [`Message`] variant lists its fields in the exact order the relay
//! reconstructs them. The fields are ABI-encoded as a parameter list
//! (`address` and `uint256` padded to 32 bytes, `bytes32` verbatim, `string`
//! and arrays as offset plus length-prefixed tail) and hashed with Keccak-256.
//! The resulting 32-byte digest is what gets signed.
//!
//! Changing the order or the type of any field changes the digest and the
//! relay will reject the signature.

use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::SolValue;

/// Domain tag hashed together with every phone number.
pub const PHONE_HASH_DOMAIN: &str = "BOSagora Phone Number";

/// A signable message, one variant per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    /// A terminal opens a payment for `account`.
    OpenNewPayment {
        /// Caller-supplied purchase id.
        purchase_id: &'a str,
        /// Purchase amount in base units.
        amount: U256,
        /// Currency symbol.
        currency: &'a str,
        /// Shop receiving the payment.
        shop_id: B256,
        /// Paying account or temporary account.
        account: Address,
        /// Terminal opening the payment.
        terminal_id: &'a str,
    },
    /// A terminal confirms or rejects an approved payment.
    CloseNewPayment {
        /// Payment id as returned by the relay.
        payment_id: &'a str,
        /// Whether the payment is confirmed.
        confirm: bool,
    },
    /// A terminal starts cancelling a payment.
    OpenCancelPayment {
        /// Payment id as returned by the relay.
        payment_id: &'a str,
        /// Terminal requesting the cancellation.
        terminal_id: &'a str,
    },
    /// A terminal confirms or rejects a cancellation.
    CloseCancelPayment {
        /// Payment id as returned by the relay.
        payment_id: &'a str,
        /// Whether the cancellation is confirmed.
        confirm: bool,
    },
    /// The paying user approves a new payment.
    NewPaymentApproval {
        /// Payment id.
        payment_id: B256,
        /// Purchase id of the payment.
        purchase_id: &'a str,
        /// Purchase amount in base units.
        amount: U256,
        /// Currency symbol.
        currency: &'a str,
        /// Shop receiving the payment.
        shop_id: B256,
        /// Approving account.
        account: Address,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of `account`.
        nonce: U256,
    },
    /// The shop owner approves a cancellation.
    CancelPaymentApproval {
        /// Payment id.
        payment_id: B256,
        /// Purchase id of the payment.
        purchase_id: &'a str,
        /// Approving shop owner.
        account: Address,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of `account`.
        nonce: U256,
    },
    /// A user requests a temporary account.
    TemporaryAccount {
        /// Requesting account.
        account: Address,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of `account`.
        nonce: U256,
    },
    /// A provider sends points to a wallet.
    ProvideToAddress {
        /// Sending provider.
        provider: Address,
        /// Receiving wallet.
        receiver: Address,
        /// Points in base units.
        amount: U256,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of the signer.
        nonce: U256,
    },
    /// A provider sends points to a phone hash.
    ProvideToPhone {
        /// Sending provider.
        provider: Address,
        /// Receiving phone hash.
        phone_hash: B256,
        /// Points in base units.
        amount: U256,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of the signer.
        nonce: U256,
    },
    /// An account registers an agent (assistant, refund or withdrawal agent).
    RegisterAgent {
        /// Delegating account.
        account: Address,
        /// Agent account, zero to clear.
        agent: Address,
        /// Side chain id.
        chain_id: u64,
        /// Ledger nonce of `account`.
        nonce: U256,
    },
    /// A purchase is recorded on the save server.
    NewPurchase {
        /// Caller-supplied purchase id.
        purchase_id: &'a str,
        /// Amount paid in cash, base units.
        cash_amount: U256,
        /// Loyalty granted for the purchase, base units.
        loyalty: U256,
        /// Currency symbol.
        currency: &'a str,
        /// Shop where the purchase happened.
        shop_id: B256,
        /// Buyer wallet, zero if unknown.
        account: Address,
        /// Buyer phone hash.
        phone_hash: B256,
        /// Asset address recording the purchase.
        sender: Address,
        /// Side chain id.
        chain_id: u64,
    },
    /// A recorded purchase is cancelled.
    CancelPurchase {
        /// Purchase id to cancel.
        purchase_id: &'a str,
        /// Asset address recording the cancellation.
        sender: Address,
        /// Side chain id.
        chain_id: u64,
    },
    /// A settlement manager collects from its client shops.
    CollectSettlement {
        /// Manager shop id.
        manager_id: B256,
        /// Client shop ids, in the order sent.
        client_ids: &'a [B256],
        /// Side chain id.
        chain_id: u64,
        /// Shop nonce of the signer.
        nonce: U256,
    },
    /// A shop designates its settlement manager.
    SetSettlementManager {
        /// Client shop id.
        shop_id: B256,
        /// Manager shop id.
        manager_id: B256,
        /// Side chain id.
        chain_id: u64,
        /// Shop nonce of the signer.
        nonce: U256,
    },
    /// A shop removes its settlement manager.
    RemoveSettlementManager {
        /// Client shop id.
        shop_id: B256,
        /// Side chain id.
        chain_id: u64,
        /// Shop nonce of the signer.
        nonce: U256,
    },
    /// A shop refunds its settled amount.
    ShopRefund {
        /// Shop id.
        shop_id: B256,
        /// Refund amount, a multiple of `10^9`.
        amount: U256,
        /// Side chain id.
        chain_id: u64,
        /// Shop nonce of the signer.
        nonce: U256,
    },
    /// A token transfer, used for withdrawals through the loyalty bridge.
    Transfer {
        /// Chain the token lives on.
        chain_id: u64,
        /// Token contract.
        token: Address,
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Amount, a multiple of `10^9`.
        amount: U256,
        /// Ledger nonce of `from`.
        nonce: U256,
        /// Unix time after which the transfer is void.
        expiry: u64,
    },
}

impl Message<'_> {
    /// ABI-encodes the fields as a parameter list.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            Self::OpenNewPayment {
                purchase_id,
                amount,
                currency,
                shop_id,
                account,
                terminal_id,
            } => (
                "OpenNewPayment".to_owned(),
                purchase_id.to_owned(),
                amount,
                currency.to_owned(),
                shop_id,
                account,
                terminal_id.to_owned(),
            )
                .abi_encode_params(),
            Self::CloseNewPayment {
                payment_id,
                confirm,
            } => (
                "CloseNewPayment".to_owned(),
                payment_id.to_owned(),
                flag(confirm),
            )
                .abi_encode_params(),
            Self::OpenCancelPayment {
                payment_id,
                terminal_id,
            } => (
                "OpenCancelPayment".to_owned(),
                payment_id.to_owned(),
                terminal_id.to_owned(),
            )
                .abi_encode_params(),
            Self::CloseCancelPayment {
                payment_id,
                confirm,
            } => (
                "CloseCancelPayment".to_owned(),
                payment_id.to_owned(),
                flag(confirm),
            )
                .abi_encode_params(),
            Self::NewPaymentApproval {
                payment_id,
                purchase_id,
                amount,
                currency,
                shop_id,
                account,
                chain_id,
                nonce,
            } => (
                payment_id,
                purchase_id.to_owned(),
                amount,
                currency.to_owned(),
                shop_id,
                account,
                U256::from(chain_id),
                nonce,
            )
                .abi_encode_params(),
            Self::CancelPaymentApproval {
                payment_id,
                purchase_id,
                account,
                chain_id,
                nonce,
            } => (
                payment_id,
                purchase_id.to_owned(),
                account,
                U256::from(chain_id),
                nonce,
            )
                .abi_encode_params(),
            Self::TemporaryAccount {
                account,
                chain_id,
                nonce,
            } => (account, U256::from(chain_id), nonce).abi_encode_params(),
            Self::ProvideToAddress {
                provider,
                receiver,
                amount,
                chain_id,
                nonce,
            } => (provider, receiver, amount, U256::from(chain_id), nonce).abi_encode_params(),
            Self::ProvideToPhone {
                provider,
                phone_hash,
                amount,
                chain_id,
                nonce,
            } => (provider, phone_hash, amount, U256::from(chain_id), nonce).abi_encode_params(),
            Self::RegisterAgent {
                account,
                agent,
                chain_id,
                nonce,
            } => (account, agent, U256::from(chain_id), nonce).abi_encode_params(),
            Self::NewPurchase {
                purchase_id,
                cash_amount,
                loyalty,
                currency,
                shop_id,
                account,
                phone_hash,
                sender,
                chain_id,
            } => (
                purchase_id.to_owned(),
                cash_amount,
                loyalty,
                currency.to_owned(),
                shop_id,
                account,
                phone_hash,
                sender,
                U256::from(chain_id),
            )
                .abi_encode_params(),
            Self::CancelPurchase {
                purchase_id,
                sender,
                chain_id,
            } => (purchase_id.to_owned(), sender, U256::from(chain_id)).abi_encode_params(),
            Self::CollectSettlement {
                manager_id,
                client_ids,
                chain_id,
                nonce,
            } => (
                "CollectSettlementAmountMultiClient".to_owned(),
                manager_id,
                client_ids.to_vec(),
                U256::from(chain_id),
                nonce,
            )
                .abi_encode_params(),
            Self::SetSettlementManager {
                shop_id,
                manager_id,
                chain_id,
                nonce,
            } => (
                "SetSettlementManager".to_owned(),
                shop_id,
                manager_id,
                U256::from(chain_id),
                nonce,
            )
                .abi_encode_params(),
            Self::RemoveSettlementManager {
                shop_id,
                chain_id,
                nonce,
            } => (
                "RemoveSettlementManager".to_owned(),
                shop_id,
                B256::ZERO,
                U256::from(chain_id),
                nonce,
            )
                .abi_encode_params(),
            Self::ShopRefund {
                shop_id,
                amount,
                chain_id,
                nonce,
            } => (shop_id, amount, U256::from(chain_id), nonce).abi_encode_params(),
            Self::Transfer {
                chain_id,
                token,
                from,
                to,
                amount,
                nonce,
                expiry,
            } => (
                U256::from(chain_id),
                token,
                from,
                to,
                amount,
                nonce,
                U256::from(expiry),
            )
                .abi_encode_params(),
        }
    }

    /// Keccak-256 of [`Message::encode`]; the value that gets signed.
    #[must_use]
    pub fn digest(&self) -> B256 {
        keccak256(self.encode())
    }
}

/// Hashes a phone number with the [`PHONE_HASH_DOMAIN`] tag.
///
/// The empty string is not special-cased: it hashes like any other number.
#[must_use]
pub fn phone_hash(phone: &str) -> B256 {
    keccak256((PHONE_HASH_DOMAIN.to_owned(), phone.to_owned()).abi_encode_params())
}

fn flag(value: bool) -> U256 {
    if value { U256::from(1u8) } else { U256::ZERO }
}
