//! Payload shapes returned by the GrowStocks API and the records built from them.
//!
//! # Design
//! The API's responses have drifted across versions: ids arrive as numbers
//! or strings, timestamps as epoch milliseconds or formatted text, and
//! optional blocks are sometimes absent. Reconstruction is therefore
//! defensive: user fields that are missing become `None`, and only fields no
//! caller could do without (a transaction id) fail the call.
//!
//! Nothing here performs I/O. The facades decide, from `ApiEnvelope`, whether
//! a payload is a success before any reconstructor runs.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SdkError;

/// Value of `transaction.action` for money flowing to the developer.
const RECEIVE_ACTION: i64 = 5;

/// The `success` / `reason` pair every payload carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason: Option<String>,
}

impl ApiEnvelope {
    pub fn read(payload: &Value) -> Self {
        ApiEnvelope::deserialize(payload).unwrap_or_default()
    }

    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("unknown")
    }
}

/// User profile fields from a token exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub growid: Option<String>,
    pub balance: Option<i64>,
    /// Scopes the user actually granted; `None` when the API did not say.
    pub scopes: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct UserPayload {
    #[serde(default)]
    user: Option<Value>,
}

impl UserRecord {
    pub fn from_payload(payload: &Value) -> Self {
        let user = UserPayload::deserialize(payload)
            .ok()
            .and_then(|p| p.user)
            .unwrap_or(Value::Null);

        UserRecord {
            id: user.get("id").and_then(as_i64),
            name: user.get("name").and_then(as_string),
            growid: user.get("growid").and_then(as_string),
            balance: user.get("balance").and_then(as_i64),
            scopes: user
                .get("authorizedScopes")
                .and_then(as_string)
                .map(|csv| split_scopes(&csv)),
        }
    }
}

fn split_scopes(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Send,
    Receive,
}

/// A pay transaction as reported by `transaction/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    /// "Paid" or "Not Paid".
    pub status_text: Option<String>,
    pub paid: bool,
    pub id: String,
    pub userid: Option<i64>,
    pub developerid: Option<i64>,
    pub amount: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl TransactionRecord {
    pub fn from_payload(payload: &Value) -> Result<Self, SdkError> {
        let tx = payload.get("transaction").filter(|t| t.is_object()).ok_or_else(|| {
            SdkError::UnexpectedPayload {
                location: "Transaction",
                reason: "missing `transaction` object".to_string(),
            }
        })?;
        let id = tx.get("id").and_then(as_string).ok_or_else(|| SdkError::UnexpectedPayload {
            location: "Transaction",
            reason: "missing `transaction.id`".to_string(),
        })?;

        let kind = match tx.get("action").and_then(as_i64) {
            Some(RECEIVE_ACTION) => TransactionKind::Receive,
            _ => TransactionKind::Send,
        };

        Ok(TransactionRecord {
            kind,
            status_text: payload.get("status").and_then(as_string),
            paid: payload.get("statusInteger").map(truthy).unwrap_or(false),
            id,
            userid: tx.get("user").and_then(as_i64),
            developerid: tx.get("party").and_then(as_i64),
            amount: tx.get("amount").and_then(as_i64).unwrap_or(0),
            created_at: tx.get("datetime").and_then(parse_timestamp),
            notes: tx.get("notes").and_then(as_string),
        })
    }
}

/// Id of a transaction just created by `transaction/create` or a payment.
pub fn transaction_id(payload: &Value, location: &'static str) -> Result<String, SdkError> {
    let field = payload.get("transaction");
    field
        .and_then(as_string)
        .or_else(|| field.and_then(|t| t.get("id")).and_then(as_string))
        .ok_or_else(|| SdkError::UnexpectedPayload {
            location,
            reason: "missing transaction id".to_string(),
        })
}

/// Balance reported alongside a successful pay or balance call.
pub fn balance(payload: &Value) -> Option<i64> {
    payload.get("balance").and_then(as_i64)
}

/// JavaScript-style truthiness for the loosely typed status flags.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(as_string(&Value::deserialize(deserializer)?))
}

/// Numbers are epoch milliseconds; strings may be RFC 3339, a numeric
/// millisecond count, or `YYYY-MM-DD HH:MM:SS` in UTC.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return Utc.timestamp_millis_opt(ms).single();
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}
