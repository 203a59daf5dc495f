//! The seam between the dispatcher and the network.
//!
//! `Transport` is the only component that performs I/O. `ReqwestTransport`
//! is the production implementation; tests substitute their own.

use async_trait::async_trait;

use crate::error::SdkError;
use crate::http::{BodyEncoding, HttpMethod, HttpRequest, HttpResponse};

/// Executes one described request and returns whatever the server said.
///
/// Implementations must return `Ok` for every received response, whatever
/// its status; status interpretation belongs to the dispatcher. `Err` means
/// no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SdkError>;
}

/// `reqwest`-backed transport. No retries and no timeout beyond reqwest's own.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Like `default()`, but reports a failed client setup instead of panicking.
    pub fn try_default() -> Result<Self, SdkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SdkError::ClientSetup { source: Box::new(e) })?;
        Ok(Self { client })
    }
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SdkError> {
        let transport_error = |e: reqwest::Error| SdkError::Transport {
            method: request.method.to_string(),
            url: request.url.clone(),
            source: Box::new(e),
        };

        let mut builder = self.client.request(method(request.method), &request.url);
        if request.forward_headers {
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if request.sends_body() {
            builder = match request.encoding {
                BodyEncoding::Json => builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(request.json_body()),
                BodyEncoding::Multipart => {
                    let form = request
                        .body
                        .iter()
                        .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                            form.text(k.clone(), v.clone())
                        });
                    builder.multipart(form)
                }
            };
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        tracing::trace!(method = %request.method, url = %request.url, status, "transport call returned");
        Ok(HttpResponse { status, headers, body })
    }
}
