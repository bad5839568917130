//! Sample purchase id generation.
//!
//! Purchase ids are chosen by the caller so the save server can deduplicate
//! retries. This generator produces ids that are unique within one process:
//! a `P` prefix, a 10-digit counter and a 4-digit random suffix.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngExt;

/// Counter-backed generator of purchase ids.
///
/// Each generator owns its counter; share one through an `Arc` when several
/// tasks must draw from the same sequence.
#[derive(Debug, Default)]
pub struct PurchaseIdGenerator {
    counter: AtomicU64,
}

impl PurchaseIdGenerator {
    /// A generator whose first id uses counter `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// A generator whose first id uses counter `last + 1`.
    #[must_use]
    pub const fn starting_at(last: u64) -> Self {
        Self {
            counter: AtomicU64::new(last),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix: u32 = rand::rng().random_range(0..10_000);
        format!("P{count:010}{suffix:04}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_fixed_layout_and_increase() {
        let generator = PurchaseIdGenerator::starting_at(41);
        let first = generator.next_id();
        let second = generator.next_id();
        assert_eq!(first.len(), 15);
        assert!(first.starts_with("P0000000042"));
        assert!(second.starts_with("P0000000043"));
        assert!(first[1..].bytes().all(|b| b.is_ascii_digit()));
    }
}
