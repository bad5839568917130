//! Data returned by the relay and save servers.
//!
//! These are snapshots owned by the server. Status codes such as
//! `payment_status` or `task_status` are kept as opaque integers; the SDK
//! never drives them.

mod ledger;
mod payment;
mod purchase;
mod shop;

pub use ledger::*;
pub use payment::*;
pub use purchase::*;
pub use shop::*;
