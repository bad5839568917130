#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP clients for the ACC loyalty-point payment network.
//!
//! Every role client wraps a shared [`RelayClient`], which owns the endpoints,
//! the `reqwest` client and the chain caches, and a signer implementing
//! [`acc_sdk_evm::SignerLike`]. Signed operations fetch a fresh nonce, build
//! the message, sign it and post it; the response envelope is unwrapped into
//! typed data from [`acc_sdk::types`].
//!
//! # Modules
//!
//! - [`client`] - Shared request context and read-only queries
//! - [`error`] - Client error type
//! - [`payment`] - Payment lifecycle for terminals, users and shops
//! - [`provider`] - Point provisioning
//! - [`settlement`] - Shop settlement, refunds, withdrawals and agents
//! - [`purchase`] - Purchase records on the save server
//! - [`event`] - Polling collector for the task feed
//!
//! # Feature Flags
//!
//! - `telemetry` - Emits a `tracing` span per relay round trip
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use acc_sdk::network::NetworkType;
//! use acc_sdk_evm::signer_from_private_key;
//! use acc_sdk_http::{PaymentClient, RelayClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let relay = Arc::new(RelayClient::for_network(NetworkType::TestNet)?);
//! let signer = signer_from_private_key(&std::env::var("SHOP_KEY")?)?;
//! let payments = PaymentClient::new(relay, signer);
//! let sequence = payments.get_latest_task_sequence().await?;
//! println!("latest task: {sequence}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod payment;
pub mod provider;
pub mod purchase;
pub mod settlement;

pub use client::{ClientConfig, RelayClient};
pub use error::ClientError;
pub use event::{
    CollectorState, CollectorStats, TaskEventCollector, TaskEventListener, TaskFeed,
};
pub use payment::{PaymentClient, ShopPaymentClient, UserPaymentClient};
pub use provider::ProviderClient;
pub use purchase::{NewPurchase, SavePurchaseClient, loyalty_in_transaction};
pub use settlement::SettlementClient;
