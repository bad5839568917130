#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Message encoding and signing for the ACC payment network.
//!
//! Every state-changing request to the relay or the save server carries a
//! signature over a canonical message. This crate builds those messages and
//! signs them.
//!
//! - [`message`] - ABI encoding and Keccak-256 digests, one [`Message`]
//!   variant per operation, plus [`phone_hash`]
//! - [`signer`] - EIP-191 signing of digests and signer recovery
//!
//! # Feature Flags
//!
//! - `signer` (default) - local private-key signing via `alloy-signer-local`
//!
//! # Example
//!
//! ```
//! use acc_sdk_evm::{Message, phone_hash};
//! use alloy_primitives::{Address, U256};
//!
//! let digest = Message::ProvideToPhone {
//!     provider: Address::ZERO,
//!     phone_hash: phone_hash("08201012341234"),
//!     amount: U256::from(1u8),
//!     chain_id: 24680,
//!     nonce: U256::ZERO,
//! }
//! .digest();
//! assert_eq!(digest.len(), 32);
//! ```

pub mod message;
pub mod signer;

pub use message::{Message, PHONE_HASH_DOMAIN, phone_hash};
#[cfg(feature = "signer")]
pub use signer::signer_from_private_key;
pub use signer::{SignerLike, SigningError, recover_signer, sign_digest};
