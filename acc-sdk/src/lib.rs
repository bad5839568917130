#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the ACC loyalty-point payment network.
//!
//! This crate holds everything that does not need a key or a socket: amount
//! parsing, identifier decoding, the response envelope, the data returned by
//! the servers and the network endpoint table. Message encoding and signing
//! live in `acc-sdk-evm`; the HTTP clients live in `acc-sdk-http`.
//!
//! # Modules
//!
//! - [`amount`] - Fixed-point decimal amounts
//! - [`error`] - Encoding and response error types
//! - [`id`] - Hex identifiers and addresses
//! - [`network`] - Network selection and server endpoints
//! - [`proto`] - Response envelope and wire helpers
//! - [`purchase_id`] - Sample purchase id generation
//! - [`timestamp`] - Unix timestamps
//! - [`types`] - Server-owned data snapshots
//!
//! # Feature Flags
//!
//! - `cli` - Derives `clap::ValueEnum` for [`network::NetworkType`]

pub mod amount;
pub mod error;
pub mod id;
pub mod network;
pub mod proto;
pub mod purchase_id;
pub mod timestamp;
pub mod types;

pub use alloy_primitives::{Address, B256, U256};
