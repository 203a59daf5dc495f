//! URL catalog for the GrowStocks auth, OAuth and pay services.
//!
//! # Design
//! The catalog is plain data plus URL builders; it performs no I/O. The
//! balance and send-payment paths have no published location, so they are
//! carried as optional configuration and asking for them while unset is a
//! `ConfigError` rather than a guessed URL.

use crate::config::Scope;
use crate::error::ConfigError;

pub const AUTH_BASE: &str = "https://api.growstocks.xyz/v1/auth";
pub const PAY_BASE: &str = "https://api.growstocks.xyz/v1/pay";
pub const OAUTH_BASE: &str = "https://auth.growstocks.xyz";
pub const PAY_SITE: &str = "https://pay.growstocks.xyz";

const USER_PATH: &str = "/user";
const CREATE_TRANSACTION_PATH: &str = "/transaction/create";
const GET_TRANSACTION_PATH: &str = "/transaction/get";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_base: String,
    pub oauth_base: String,
    pub pay_base: String,
    /// Root of the browser-facing payment site, e.g. `https://pay.growstocks.xyz`.
    pub pay_site: String,
    pub balance_path: Option<String>,
    pub send_path: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: AUTH_BASE.to_string(),
            oauth_base: OAUTH_BASE.to_string(),
            pay_base: PAY_BASE.to_string(),
            pay_site: PAY_SITE.to_string(),
            balance_path: None,
            send_path: None,
        }
    }
}

impl Endpoints {
    /// Point every service at one host root, as a local mock server exposes them.
    pub fn with_base(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            auth_base: format!("{root}/v1/auth"),
            oauth_base: root.to_string(),
            pay_base: format!("{root}/v1/pay"),
            pay_site: root.to_string(),
            balance_path: None,
            send_path: None,
        }
    }

    pub fn balance_path(mut self, path: impl Into<String>) -> Self {
        self.balance_path = Some(normalize_path(path.into()));
        self
    }

    pub fn send_path(mut self, path: impl Into<String>) -> Self {
        self.send_path = Some(normalize_path(path.into()));
        self
    }

    /// Token exchange / user info.
    pub fn user(&self) -> String {
        format!("{}{USER_PATH}", self.auth_base)
    }

    pub fn create_transaction(&self) -> String {
        format!("{}{CREATE_TRANSACTION_PATH}", self.pay_base)
    }

    pub fn get_transaction(&self) -> String {
        format!("{}{GET_TRANSACTION_PATH}", self.pay_base)
    }

    pub fn balance(&self) -> Result<String, ConfigError> {
        self.balance_path
            .as_deref()
            .map(|path| format!("{}{path}", self.pay_base))
            .ok_or(ConfigError::EndpointNotConfigured("balance"))
    }

    pub fn send(&self) -> Result<String, ConfigError> {
        self.send_path
            .as_deref()
            .map(|path| format!("{}{path}", self.pay_base))
            .ok_or(ConfigError::EndpointNotConfigured("send"))
    }

    /// OAuth consent page the end user is redirected to.
    pub fn oauth_authorize(&self, client_code: &str, scopes: &[Scope], redirect_url: &str) -> String {
        let scopes = scopes.iter().map(Scope::as_str).collect::<Vec<_>>().join(",");
        format!(
            "{}/user/authorize?client={}&scopes={}&redirect_uri={}",
            self.oauth_base,
            urlencoding::encode(client_code),
            urlencoding::encode(&scopes),
            urlencoding::encode(redirect_url),
        )
    }

    /// Payment confirmation page for a transaction created by `bill`.
    pub fn pay_authorize(&self, client_code: &str, pay_redirect_url: &str, transaction_id: &str) -> String {
        format!(
            "{}/pay?client={}&redirect_uri={}&transaction={}",
            self.pay_site,
            urlencoding::encode(client_code),
            urlencoding::encode(pay_redirect_url),
            urlencoding::encode(transaction_id),
        )
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
