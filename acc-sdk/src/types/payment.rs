use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::error::ResponseError;
use crate::proto::DecimalU256;

/// Task type of a newly opened payment.
pub const TASK_PAY_NEW: &str = "pay_new";

/// Task type of a payment cancellation.
pub const TASK_PAY_CANCEL: &str = "pay_cancel";

/// Quote for paying `amount` of `currency` with a user's points.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    /// Paying account.
    pub account: Address,
    /// Requested amount.
    #[serde_as(as = "DecimalU256")]
    pub amount: U256,
    /// Currency symbol.
    pub currency: String,
    /// Current point balance.
    #[serde_as(as = "DecimalU256")]
    pub balance: U256,
    /// Value of the balance in `currency`.
    #[serde_as(as = "DecimalU256")]
    pub balance_value: U256,
    /// Points charged for the purchase.
    #[serde_as(as = "DecimalU256")]
    pub paid_point: U256,
    /// Value of the charged points.
    #[serde_as(as = "DecimalU256")]
    pub paid_value: U256,
    /// Points charged as fee.
    #[serde_as(as = "DecimalU256")]
    pub fee_point: U256,
    /// Value of the fee.
    #[serde_as(as = "DecimalU256")]
    pub fee_value: U256,
    /// Total points charged.
    #[serde_as(as = "DecimalU256")]
    pub total_point: U256,
    /// Total value charged.
    #[serde_as(as = "DecimalU256")]
    pub total_value: U256,
}

/// Full snapshot of a payment.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTaskItem {
    /// Payment id assigned by the relay.
    pub payment_id: B256,
    /// Caller-supplied purchase id.
    pub purchase_id: String,
    /// Purchase amount.
    #[serde_as(as = "DecimalU256")]
    pub amount: U256,
    /// Currency symbol.
    pub currency: String,
    /// Shop receiving the payment.
    pub shop_id: B256,
    /// Paying account.
    pub account: Address,
    /// Points charged for the purchase.
    #[serde_as(as = "DecimalU256")]
    pub paid_point: U256,
    /// Value of the charged points.
    #[serde_as(as = "DecimalU256")]
    pub paid_value: U256,
    /// Points charged as fee.
    #[serde_as(as = "DecimalU256")]
    pub fee_point: U256,
    /// Value of the fee.
    #[serde_as(as = "DecimalU256")]
    pub fee_value: U256,
    /// Total points charged.
    #[serde_as(as = "DecimalU256")]
    pub total_point: U256,
    /// Total value charged.
    #[serde_as(as = "DecimalU256")]
    pub total_value: U256,
    /// Terminal that opened the payment.
    pub terminal_id: String,
    /// Server-owned status code.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub payment_status: i32,
}

/// Reduced payment snapshot returned by approval calls.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTaskItemShort {
    /// Payment id assigned by the relay.
    pub payment_id: B256,
    /// Caller-supplied purchase id.
    pub purchase_id: String,
    /// Purchase amount.
    #[serde_as(as = "DecimalU256")]
    pub amount: U256,
    /// Currency symbol.
    pub currency: String,
    /// Shop receiving the payment.
    pub shop_id: B256,
    /// Paying account.
    pub account: Address,
    /// Terminal that opened the payment.
    pub terminal_id: String,
    /// Server-owned status code.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub payment_status: i32,
}

/// Snapshot of a shop-level task (shop registration, updates, status changes).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopTaskItem {
    /// Task id.
    pub task_id: String,
    /// Shop concerned by the task.
    pub shop_id: B256,
    /// Shop name.
    pub name: String,
    /// Shop currency.
    pub currency: String,
    /// Shop status.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub status: i32,
    /// Shop owner.
    pub account: Address,
    /// Terminal that triggered the task.
    #[serde(default)]
    pub terminal_id: String,
    /// Server-owned task status.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub task_status: i32,
}

/// One raw entry of the task feed, `data` not yet interpreted.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Position in the feed; strictly increasing.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub sequence: u64,
    /// Task type, e.g. [`TASK_PAY_NEW`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Result code of the task.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub code: i64,
    /// Result message of the task.
    #[serde(default)]
    pub message: String,
    /// Task payload.
    #[serde(default)]
    pub data: Value,
}

impl TaskRecord {
    /// Whether the payload is a payment snapshot.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        self.kind == TASK_PAY_NEW || self.kind == TASK_PAY_CANCEL
    }

    /// Interprets the payload according to the task type.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::NullData`] if the payload is null and
    /// [`ResponseError::Decode`] if it does not match the task type.
    pub fn into_event(self) -> Result<TaskEvent, ResponseError> {
        if self.data.is_null() {
            return Err(ResponseError::NullData);
        }
        let item = if self.is_payment() {
            TaskItem::Payment(serde_json::from_value(self.data)?)
        } else {
            TaskItem::Shop(serde_json::from_value(self.data)?)
        };
        Ok(TaskEvent {
            sequence: self.sequence,
            kind: self.kind,
            code: self.code,
            message: self.message,
            item,
        })
    }
}

/// Typed payload of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskItem {
    /// `pay_new` or `pay_cancel`.
    Payment(PaymentTaskItem),
    /// Any other task type.
    Shop(ShopTaskItem),
}

/// A task from the feed with its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    /// Position in the feed.
    pub sequence: u64,
    /// Task type.
    pub kind: String,
    /// Result code of the task.
    pub code: i64,
    /// Result message of the task.
    pub message: String,
    /// Decoded payload.
    pub item: TaskItem,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payment_json() -> Value {
        json!({
            "paymentId": "0x6e3b5e0a0a1c1e1b2c4a9b0e2f0c6a8d3b1f9e2d7c5a4b3e2d1c0b9a8f7e6d5c",
            "purchaseId": "P000001",
            "amount": "1000000000000000000",
            "currency": "php",
            "shopId": "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874",
            "account": "0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84",
            "paidPoint": "1",
            "paidValue": "2",
            "feePoint": "3",
            "feeValue": "4",
            "totalPoint": "5",
            "totalValue": "6",
            "terminalId": "POS001",
            "paymentStatus": 11
        })
    }

    #[test]
    fn payment_record_decodes_as_payment() {
        let record: TaskRecord = serde_json::from_value(json!({
            "sequence": "7",
            "type": "pay_new",
            "code": 0,
            "message": "Success",
            "data": payment_json(),
        }))
        .unwrap();
        let event = record.into_event().unwrap();
        assert_eq!(event.sequence, 7);
        let TaskItem::Payment(item) = event.item else {
            panic!("expected payment item");
        };
        assert_eq!(item.purchase_id, "P000001");
        assert_eq!(item.payment_status, 11);
        assert_eq!(item.total_value, U256::from(6u8));
    }

    #[test]
    fn other_record_decodes_as_shop() {
        let record: TaskRecord = serde_json::from_value(json!({
            "sequence": 8,
            "type": "shop_update",
            "code": 0,
            "message": "Success",
            "data": {
                "taskId": "0x01",
                "shopId": "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874",
                "name": "Shop",
                "currency": "php",
                "status": "1",
                "account": "0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84",
                "terminalId": "",
                "taskStatus": 2
            },
        }))
        .unwrap();
        assert!(!record.is_payment());
        let event = record.into_event().unwrap();
        assert!(matches!(event.item, TaskItem::Shop(ref shop) if shop.name == "Shop" && shop.task_status == 2));
    }

    #[test]
    fn record_without_data_is_rejected() {
        let record: TaskRecord = serde_json::from_value(json!({
            "sequence": 9,
            "type": "pay_cancel",
            "code": 0,
            "message": "",
        }))
        .unwrap();
        assert!(matches!(record.into_event(), Err(ResponseError::NullData)));
    }
}
