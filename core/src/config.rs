//! Client credentials, scopes and the options they are loaded from.
//!
//! # Design
//! `ClientOptions` is the loose, serde-friendly shape callers hand in (the
//! same camelCase keys as a GrowStocks `keys.json`). `ClientConfig` is the
//! validated form: constructing one is the only place the option invariants
//! are checked, so every `GrowStocksClient` holds a config that already
//! satisfies them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::endpoints::Endpoints;
use crate::error::ConfigError;

/// A permission the end user grants to the organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Email,
    Profile,
    Balance,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Email => "email",
            Scope::Profile => "profile",
            Scope::Balance => "balance",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Scope::Email),
            "profile" => Ok(Scope::Profile),
            "balance" => Ok(Scope::Balance),
            other => Err(ConfigError::InvalidScope(other.to_string())),
        }
    }
}

/// Client secret. Wiped on drop and never rendered by `Debug`.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Unvalidated client options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub organisation: Option<String>,
    pub url: Option<String>,
    pub client_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub secret: Option<Secret>,
    #[serde(rename = "redirectURL")]
    pub redirect_url: Option<String>,
    #[serde(rename = "payRedirectURL")]
    pub pay_redirect_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Host root replacing the production API hosts.
    pub api_root: Option<String>,
    pub balance_path: Option<String>,
    pub send_path: Option<String>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<Secret>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(Secret::new))
}

impl ClientOptions {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Read options from `GROWSTOCKS_*` environment variables.
    ///
    /// `GROWSTOCKS_SCOPES` is comma-separated. Unset variables stay `None`;
    /// validation happens when the options are turned into a `ClientConfig`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            organisation: var("GROWSTOCKS_ORGANISATION"),
            url: var("GROWSTOCKS_URL"),
            client_code: var("GROWSTOCKS_CLIENT_CODE"),
            secret: var("GROWSTOCKS_SECRET").map(Secret::new),
            redirect_url: var("GROWSTOCKS_REDIRECT_URL"),
            pay_redirect_url: var("GROWSTOCKS_PAY_REDIRECT_URL"),
            scopes: var("GROWSTOCKS_SCOPES")
                .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
                .unwrap_or_default(),
            api_root: var("GROWSTOCKS_API_ROOT"),
            balance_path: var("GROWSTOCKS_BALANCE_PATH"),
            send_path: var("GROWSTOCKS_SEND_PATH"),
        }
    }
}

/// Validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    organisation: String,
    url: String,
    client_code: String,
    secret: Secret,
    redirect_url: String,
    pay_redirect_url: Option<String>,
    scopes: Vec<Scope>,
    endpoints: Endpoints,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn organisation(&self) -> &str {
        &self.organisation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client_code(&self) -> &str {
        &self.client_code
    }

    pub(crate) fn secret(&self) -> &str {
        self.secret.expose()
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn pay_redirect_url(&self) -> Option<&str> {
        self.pay_redirect_url.as_deref()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn require_scope(&self, scope: Scope) -> Result<(), ConfigError> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ConfigError::MissingScope(scope))
        }
    }
}

impl TryFrom<ClientOptions> for ClientConfig {
    type Error = ConfigError;

    fn try_from(options: ClientOptions) -> Result<Self, Self::Error> {
        let mut endpoints = match options.api_root.as_deref() {
            Some(root) => Endpoints::with_base(root),
            None => Endpoints::default(),
        };
        if let Some(path) = options.balance_path {
            endpoints = endpoints.balance_path(path);
        }
        if let Some(path) = options.send_path {
            endpoints = endpoints.send_path(path);
        }

        let scopes = options
            .scopes
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<Scope>, _>>()?;

        ClientConfigBuilder {
            organisation: options.organisation,
            url: options.url,
            client_code: options.client_code,
            secret: options.secret,
            redirect_url: options.redirect_url,
            pay_redirect_url: options.pay_redirect_url,
            scopes,
            endpoints,
        }
        .build()
    }
}

#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    organisation: Option<String>,
    url: Option<String>,
    client_code: Option<String>,
    secret: Option<Secret>,
    redirect_url: Option<String>,
    pay_redirect_url: Option<String>,
    scopes: Vec<Scope>,
    endpoints: Endpoints,
}

impl ClientConfigBuilder {
    pub fn organisation(mut self, value: impl Into<String>) -> Self {
        self.organisation = Some(value.into());
        self
    }

    pub fn url(mut self, value: impl Into<String>) -> Self {
        self.url = Some(value.into());
        self
    }

    pub fn client_code(mut self, value: impl Into<String>) -> Self {
        self.client_code = Some(value.into());
        self
    }

    pub fn secret(mut self, value: impl Into<String>) -> Self {
        self.secret = Some(Secret::new(value));
        self
    }

    pub fn redirect_url(mut self, value: impl Into<String>) -> Self {
        self.redirect_url = Some(value.into());
        self
    }

    pub fn pay_redirect_url(mut self, value: impl Into<String>) -> Self {
        self.pay_redirect_url = Some(value.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes.extend(scopes);
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        fn required<T>(value: Option<T>, name: &'static str, empty: impl Fn(&T) -> bool) -> Result<T, ConfigError> {
            match value {
                Some(v) if !empty(&v) => Ok(v),
                _ => Err(ConfigError::MissingField(name)),
            }
        }
        let blank = |s: &String| s.trim().is_empty();

        let organisation = required(self.organisation, "organisation", blank)?;
        let url = required(self.url, "url", blank)?;
        let client_code = required(self.client_code, "clientCode", blank)?;
        let secret = required(self.secret, "secret", |s: &Secret| s.expose().is_empty())?;
        let redirect_url = required(self.redirect_url, "redirectURL", blank)?;

        if self.scopes.is_empty() {
            return Err(ConfigError::EmptyScopes);
        }
        if self.scopes.iter().all(|s| *s == Scope::Balance) {
            return Err(ConfigError::BalanceScopeAlone);
        }

        Ok(ClientConfig {
            organisation,
            url,
            client_code,
            secret,
            redirect_url,
            pay_redirect_url: self.pay_redirect_url.filter(|u| !u.trim().is_empty()),
            scopes: self.scopes,
            endpoints: self.endpoints,
        })
    }
}
