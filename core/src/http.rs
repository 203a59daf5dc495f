//! Outbound request descriptors and the responses transports hand back.
//!
//! # Design
//! An `HttpRequest` describes one call as plain data: method, URL, a flat
//! key/value body with its encoding policy, and headers. Building one never
//! touches the network and sending one never mutates it; the `Transport`
//! borrows it for the duration of the call. A fresh descriptor is built for
//! every logical call.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Header injected when the caller does not set its own `User-Agent`.
pub const USER_AGENT: &str = concat!(
    "GrowStocksRS (https://github.com/growstocks, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Body fields that are never printed.
const REDACTED_FIELDS: &[&str] = &["secret", "token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the body is put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyEncoding {
    #[default]
    Json,
    /// `multipart/form-data`, one text part per field. The GrowStocks API
    /// expects this for every POST.
    Multipart,
}

/// One outbound call, described as data.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub encoding: BodyEncoding,
    /// When false the transport sends no caller headers at all.
    pub forward_headers: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: BTreeMap::new(),
            headers: vec![("User-Agent".to_string(), USER_AGENT.to_string())],
            encoding: BodyEncoding::Json,
            forward_headers: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    /// Set a header, replacing any existing header with the same
    /// (case-insensitive) name, including the default `User-Agent`.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn multipart(mut self) -> Self {
        self.encoding = BodyEncoding::Multipart;
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.forward_headers = false;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// GET and HEAD carry no body.
    pub fn sends_body(&self) -> bool {
        !matches!(self.method, HttpMethod::Get | HttpMethod::Head)
    }

    /// Body rendered under the JSON policy.
    pub fn json_body(&self) -> String {
        let map: serde_json::Map<String, Value> = self
            .body
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map).to_string()
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: BTreeMap<&str, &str> = self
            .body
            .iter()
            .map(|(k, v)| {
                let shown = if REDACTED_FIELDS.contains(&k.as_str()) { "***" } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body", &body)
            .field("headers", &self.headers)
            .field("encoding", &self.encoding)
            .field("forward_headers", &self.forward_headers)
            .finish()
    }
}

/// A response as received by a transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
