//! Classification of accrual processor responses
//!
//! Turning an HTTP response into a [`PollOutcome`] is kept free of any I/O
//! so every branch can be exercised without a server.

use std::str::FromStr;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::types::AccrualStatus;

/// What the accrual processor said about one order
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The processor knows the order
    Accepted {
        /// Processor-side status
        status: AccrualStatus,
        /// Points awarded; zero when the processor sent none
        accrual: Decimal,
    },

    /// The processor does not know the order (yet)
    Unknown,

    /// The processor asked us to back off
    Throttled {
        /// How long to suspend polling
        retry_after: Duration,
    },

    /// Anything else: network failure, timeout, 5xx, undecodable body
    TransientError {
        /// Human readable cause, for logs only
        reason: String,
    },
}

impl PollOutcome {
    /// Build a transient error from anything displayable
    pub fn transient(reason: impl Into<String>) -> Self {
        PollOutcome::TransientError {
            reason: reason.into(),
        }
    }
}

/// Body of a `200 OK` from the processor
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccrualResponse {
    /// Order number the answer is about
    pub order: String,

    /// Processor-side status
    pub status: AccrualStatus,

    /// Points awarded, absent until the order is processed
    #[serde(default, deserialize_with = "deserialize_accrual")]
    pub accrual: Option<Decimal>,
}

/// Read an accrual given as a JSON number or a numeric string
///
/// JSON numbers go through their shortest textual form, so `500.5`
/// becomes exactly `500.5` rather than the nearest binary float.
fn deserialize_accrual<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => {
            return Err(de::Error::custom(format!(
                "accrual must be a number, got {other}"
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid accrual '{text}': {e}")))
}

/// Parse a `Retry-After` header given in whole seconds
///
/// Returns `None` for a missing header, an HTTP date, or anything that is
/// not a non-negative integer.
pub fn parse_retry_after(header: Option<&str>) -> Option<Duration> {
    header
        .map(str::trim)
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Classify a processor response for order `number`
///
/// # Arguments
///
/// * `number` - The order that was polled
/// * `status` - HTTP status of the response
/// * `retry_after` - Raw `Retry-After` header, if any
/// * `body` - Response body; only read for `200 OK`
/// * `default_retry_after` - Backoff used when `Retry-After` is unusable
pub fn classify(
    number: &str,
    status: StatusCode,
    retry_after: Option<&str>,
    body: &[u8],
    default_retry_after: Duration,
) -> PollOutcome {
    match status {
        StatusCode::OK => classify_body(number, body),
        StatusCode::NO_CONTENT | StatusCode::CONFLICT => PollOutcome::Unknown,
        StatusCode::TOO_MANY_REQUESTS => PollOutcome::Throttled {
            retry_after: parse_retry_after(retry_after).unwrap_or(default_retry_after),
        },
        other => PollOutcome::transient(format!("unexpected status {other}")),
    }
}

fn classify_body(number: &str, body: &[u8]) -> PollOutcome {
    let response: AccrualResponse = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(e) => return PollOutcome::transient(format!("undecodable body: {e}")),
    };

    if response.order != number {
        return PollOutcome::transient(format!(
            "response for order {} while polling {number}",
            response.order
        ));
    }

    let accrual = response.accrual.unwrap_or(Decimal::ZERO);
    if accrual < Decimal::ZERO {
        return PollOutcome::transient(format!("negative accrual {accrual}"));
    }

    PollOutcome::Accepted {
        status: response.status,
        accrual,
    }
}
