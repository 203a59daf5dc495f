//! Results of calls the remote API answered.
//!
//! # Design
//! Every GrowStocks payload carries `success`. When it is false the API has
//! refused the operation (bad token, insufficient balance, unknown
//! transaction). That is normal traffic, not an error: operations return
//! `Outcome::LogicalFailure` with the envelope below, and additionally
//! publish the envelope on the client's `error` signal.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Description of a remote-declared failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    /// Facade that issued the call, e.g. `GrowStocksClient`.
    pub location: String,
    /// Operation name, e.g. `exchangeAuthToken`.
    pub method: String,
    /// The `reason` the API gave, or `unknown` when it gave none.
    pub reason: String,
    /// Caller-supplied arguments of the failed call.
    pub params: BTreeMap<String, Value>,
}

impl ErrorEnvelope {
    pub fn new(location: impl Into<String>, method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            method: method.into(),
            reason: reason.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Either the value the call was made for, or the API's refusal.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Ok(T),
    LogicalFailure(ErrorEnvelope),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::LogicalFailure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ErrorEnvelope> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::LogicalFailure(envelope) => Some(envelope),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::LogicalFailure(envelope) => Outcome::LogicalFailure(envelope),
        }
    }

    pub fn into_result(self) -> Result<T, ErrorEnvelope> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::LogicalFailure(envelope) => Err(envelope),
        }
    }
}
