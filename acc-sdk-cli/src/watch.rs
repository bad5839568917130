//! Task-feed watcher that logs every new task.

use std::sync::Arc;
use std::time::Duration;

use acc_sdk::id::bytes32_to_hex;
use acc_sdk::types::{PaymentTaskItem, ShopTaskItem};
use acc_sdk_http::event::ListenerError;
use acc_sdk_http::{RelayClient, TaskEventCollector, TaskEventListener};
use tokio_util::sync::CancellationToken;

/// Logs payment and shop tasks at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl TaskEventListener for LogListener {
    fn on_new_payment_event(
        &self,
        kind: &str,
        code: i64,
        message: &str,
        sequence: u64,
        item: &PaymentTaskItem,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            sequence,
            kind,
            code,
            message,
            payment_id = %bytes32_to_hex(&item.payment_id),
            purchase_id = %item.purchase_id,
            account = %item.account,
            amount = %item.amount,
            currency = %item.currency,
            status = item.payment_status,
            "Payment task"
        );
        Ok(())
    }

    fn on_new_shop_event(
        &self,
        kind: &str,
        code: i64,
        message: &str,
        sequence: u64,
        item: &ShopTaskItem,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            sequence,
            kind,
            code,
            message,
            shop_id = %bytes32_to_hex(&item.shop_id),
            name = %item.name,
            status = item.status,
            "Shop task"
        );
        Ok(())
    }
}

/// Polls the task feed until `shutdown` is cancelled.
pub async fn watch(relay: Arc<RelayClient>, interval: Duration, shutdown: CancellationToken) {
    let collector = TaskEventCollector::with_interval(relay, LogListener, interval);
    collector.start().await;
    shutdown.cancelled().await;
    collector.stop().await;

    let stats = collector.stats();
    tracing::info!(
        polls = stats.polls,
        dispatched = stats.dispatched,
        failures = stats.failures,
        last_sequence = collector.last_sequence(),
        "Watcher stopped"
    );
}
