//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ClientConfig, Scope};
use crate::endpoints::Endpoints;
use crate::error::SdkError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Replays canned bodies with status 200 and records every request it was given.
///
/// `journal` gets one `request <url>` line per call; tests may append their
/// own lines to it to check ordering against the transport.
#[derive(Default)]
pub(crate) struct Scripted {
    replies: Mutex<VecDeque<Value>>,
    pub(crate) seen: Mutex<Vec<HttpRequest>>,
    pub(crate) journal: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    pub(crate) fn new(replies: impl IntoIterator<Item = Value>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
            journal: Arc::default(),
        })
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, SdkError> {
        self.journal.lock().unwrap().push(format!("request {}", request.url));
        self.seen.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front().expect("unexpected request");
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: reply.to_string(),
        })
    }
}

pub(crate) fn config(scopes: &[Scope]) -> ClientConfig {
    ClientConfig::builder()
        .organisation("Acme")
        .url("https://acme.example")
        .client_code("acme-code")
        .secret("s3cr3t")
        .redirect_url("https://acme.example/callback")
        .pay_redirect_url("https://acme.example/paid")
        .scopes(scopes.iter().copied())
        .endpoints(Endpoints::default().balance_path("/balance").send_path("/send"))
        .build()
        .unwrap()
}
