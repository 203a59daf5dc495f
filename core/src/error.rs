//! Error types for the GrowStocks SDK.
//!
//! # Design
//! Three failure classes exist and they never mix:
//!
//! - `ConfigError` is a caller programming error (bad options, bad
//!   arguments). It fails the constructor or the offending call before any
//!   request is queued.
//! - `SdkError` covers everything that goes wrong on the way to or from the
//!   remote API: connectivity, non-2xx statuses, undecodable bodies.
//! - A remote "success: false" is not an error at all. It is returned as
//!   `Outcome::LogicalFailure` carrying an `ErrorEnvelope` (see `outcome`).

use crate::config::Scope;

/// Tag carried by every HTTP status failure.
pub const HTTP_ERROR_KIND: &str = "HTTPError";

/// Invalid options or call arguments. Never recoverable by the SDK.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required client option was absent or empty.
    #[error("missing required client option `{0}` (organisation, url, clientCode, secret, redirectURL are required)")]
    MissingField(&'static str),

    /// A scope string outside `email`, `profile`, `balance`.
    #[error("invalid scope `{0}`, expected one of: email, profile, balance")]
    InvalidScope(String),

    #[error("at least one scope must be configured")]
    EmptyScopes,

    /// `balance` was requested without any other scope.
    #[error("the `balance` scope requires at least one other scope")]
    BalanceScopeAlone,

    /// The operation needs a scope the client was not configured with.
    #[error("operation requires the `{0}` scope")]
    MissingScope(Scope),

    #[error("billing requires `payRedirectURL` to be configured")]
    MissingPayRedirect,

    /// The endpoint path has no default and was not supplied in the options.
    #[error("endpoint `{0}` is not configured")]
    EndpointNotConfigured(&'static str),

    #[error("user id `{0}` is not an integer")]
    InvalidUserId(String),

    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(i64),

    /// Options could not be read from their source.
    #[error("could not load client options: {0}")]
    Load(String),
}

/// Errors surfaced by remote operations.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The remote answered with a non-2xx status.
    #[error("{message}")]
    Http {
        message: String,
        kind: &'static str,
        status: u16,
        method: String,
        url: String,
    },

    /// No response was received (DNS, connect, timeout, TLS).
    #[error("{method} {url} failed before a response was received: {source}")]
    Transport {
        method: String,
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A 2xx response whose body is not JSON.
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A successful payload is missing a field the SDK cannot do without.
    #[error("unexpected payload from {location}: {reason}")]
    UnexpectedPayload {
        location: &'static str,
        reason: String,
    },

    /// The HTTP client could not be set up (TLS backend, resolver).
    #[error("could not build the HTTP client: {source}")]
    ClientSetup {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The dispatcher dropped the call without settling it.
    #[error("request dispatcher stopped before the call settled")]
    DispatcherClosed,
}

impl SdkError {
    /// Build the error for a response whose status is not 2xx.
    pub fn http_status(status: u16, method: &str, url: &str) -> Self {
        SdkError::Http {
            message: format!("Request to {url} failed, status code {status}."),
            kind: HTTP_ERROR_KIND,
            status,
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    /// HTTP status code, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
