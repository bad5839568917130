//! Wire envelope shared by every relay and save server response.
//!
//! Every response body has the shape:
//!
//! ```json
//! { "code": 0, "error": { "message": "..." }, "data": { ... } }
//! ```
//!
//! `code == 0` means success and `data` must be present. Any other code is a
//! failure; `data` is then ignored and the server message (when present) is
//! surfaced through [`ServerError`].
//!
//! Amounts and other 256-bit quantities travel as decimal strings; see
//! [`DecimalU256`].

use std::fmt::Formatter;

use alloy_primitives::U256;
use serde::de::{DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_with::{DeserializeAs, DisplayFromStr, PickFirst, SerializeAs, serde_as};

use crate::error::{ResponseError, ServerError};

/// Error object attached to failed responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    #[serde(default)]
    pub message: Option<String>,
}

/// The `{code, error, data}` response envelope.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T = Value> {
    /// Status code, `0` on success.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub code: i64,
    /// Failure details, present only when `code != 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Result payload.
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    /// Builds a successful envelope.
    pub const fn ok(data: T) -> Self {
        Self {
            code: 0,
            error: None,
            data: Some(data),
        }
    }

    /// Builds a failed envelope.
    pub fn failure(code: i64, message: Option<String>) -> Self {
        Self {
            code,
            error: message.map(|message| ErrorBody {
                message: Some(message),
            }),
            data: None,
        }
    }

    /// Unwraps the payload, enforcing the envelope contract.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Server`] when `code != 0`
    /// - [`ResponseError::NullData`] when `code == 0` but `data` is absent or null
    pub fn into_data(self) -> Result<T, ResponseError> {
        if self.code != 0 {
            let error = ServerError::new(self.code);
            let error = match self.error.and_then(|body| body.message) {
                Some(message) => error.with_message(message),
                None => error,
            };
            return Err(error.into());
        }
        self.data.ok_or(ResponseError::NullData)
    }
}

impl ResponseEnvelope<Value> {
    /// Unwraps the payload and decodes it into `R`.
    ///
    /// # Errors
    ///
    /// Same as [`ResponseEnvelope::into_data`], plus [`ResponseError::Decode`]
    /// if the payload does not match `R`.
    pub fn decode<R: DeserializeOwned>(self) -> Result<R, ResponseError> {
        let data = self.into_data()?;
        if data.is_null() {
            return Err(ResponseError::NullData);
        }
        Ok(serde_json::from_value(data)?)
    }
}

/// `serde_with` adapter writing a [`U256`] as a decimal string.
///
/// Reading is lenient: decimal strings, `0x` hex strings and JSON integers are
/// all accepted, since the servers are not consistent about it.
#[derive(Debug, Clone, Copy)]
pub struct DecimalU256;

impl SerializeAs<U256> for DecimalU256 {
    fn serialize_as<S: Serializer>(source: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(source)
    }
}

impl<'de> DeserializeAs<'de, U256> for DecimalU256 {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = U256;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("a non-negative integer or a string holding one")
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<U256, E> {
        Ok(U256::from(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<U256, E> {
        u64::try_from(v)
            .map(U256::from)
            .map_err(|_| E::custom(format!("negative amount: {v}")))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<U256, E> {
        let v = v.trim();
        let parsed = match v.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(v, 10),
        };
        parsed.map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
    }
}

/// Reads a 256-bit value from a bare JSON value.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if `value` holds no unsigned integer.
pub fn u256_from_value(value: &Value) -> Result<U256, serde_json::Error> {
    DecimalU256::deserialize_as(value)
}
