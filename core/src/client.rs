//! `GrowStocksClient`: credentials plus the operations that need them.
//!
//! # Design
//! The client owns its validated config, its dispatcher and its event bus.
//! Every remote operation follows the same shape: validate arguments
//! (`ConfigError` on failure, before anything is queued), build a multipart
//! descriptor carrying the secret, push it through the dispatcher, then
//! branch on the payload's `success` flag. A refusal is published on the
//! `error` signal and returned as `Outcome::LogicalFailure`; a success runs
//! the matching reconstructor.
//!
//! Users and transactions built here borrow the client, so the client
//! always outlives them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};

use crate::config::{ClientConfig, Scope};
use crate::dispatcher::Dispatcher;
use crate::error::{ConfigError, SdkError};
use crate::events::{Event, EventBus, Observable};
use crate::http::HttpRequest;
use crate::outcome::{ErrorEnvelope, Outcome};
use crate::transaction::Transaction;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{self, ApiEnvelope, TransactionRecord, UserRecord};
use crate::user::GrowStocksUser;

/// Longest note the API accepts.
pub const NOTE_LIMIT: usize = 50;
const NOTE_ELLIPSIS: &str = "...";
const NOTE_KEEP: usize = 46;

const LOCATION: &str = "GrowStocksClient";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Credentials validated, no token exchanged yet.
    Constructed,
    /// At least one token exchange succeeded.
    Authorized,
}

#[derive(Debug)]
pub struct GrowStocksClient {
    config: ClientConfig,
    dispatcher: Dispatcher,
    events: EventBus,
    balance: RwLock<Option<i64>>,
    authorized: AtomicBool,
}

impl GrowStocksClient {
    /// Client backed by the default `reqwest` transport.
    ///
    /// # Panics
    /// If the TLS backend or resolver cannot be initialised. Use
    /// [`GrowStocksClient::try_new`] to get that failure as a value.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::default()))
    }

    pub fn try_new(config: ClientConfig) -> Result<Self, SdkError> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::try_default()?)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        tracing::debug!(
            organisation = %config.organisation(),
            client = %config.client_code(),
            scopes = ?config.scopes(),
            "GrowStocks client constructed"
        );
        Self {
            config,
            dispatcher: Dispatcher::new(transport),
            events: EventBus::new(),
            balance: RwLock::new(None),
            authorized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> ClientState {
        if self.authorized.load(Ordering::Acquire) {
            ClientState::Authorized
        } else {
            ClientState::Constructed
        }
    }

    /// Last balance reported by the API, if any call has reported one.
    pub fn balance(&self) -> Option<i64> {
        *self.balance.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// OAuth consent URL to redirect end users to.
    pub fn auth_url(&self) -> String {
        self.config.endpoints().oauth_authorize(
            self.config.client_code(),
            self.config.scopes(),
            self.config.redirect_url(),
        )
    }

    /// Trade an OAuth token for the user it was issued to.
    pub async fn exchange_auth_token(&self, token: &str) -> Result<Outcome<GrowStocksUser<'_>>, SdkError> {
        let outcome = self.fetch_user(token).await?;
        Ok(outcome.map(|record| GrowStocksUser::new(record, token, self)))
    }

    pub(crate) async fn fetch_user(&self, token: &str) -> Result<Outcome<UserRecord>, SdkError> {
        let request = self.signed(self.config.endpoints().user()).with_field("token", token);
        let payload = self.dispatcher.push(request).await?;

        let envelope = ApiEnvelope::read(&payload);
        if !envelope.success {
            return Ok(self.fail(LOCATION, "exchangeAuthToken", &envelope, [("token", json!(token))]));
        }

        self.authorized.store(true, Ordering::Release);
        Ok(Outcome::Ok(UserRecord::from_payload(&payload)))
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Outcome<Transaction<'_>>, SdkError> {
        let request = self
            .signed(self.config.endpoints().get_transaction())
            .with_field("transaction", id);
        let payload = self.dispatcher.push(request).await?;

        let envelope = ApiEnvelope::read(&payload);
        if !envelope.success {
            return Ok(self.fail(LOCATION, "getTransaction", &envelope, [("transaction", json!(id))]));
        }

        let record = TransactionRecord::from_payload(&payload)?;
        Ok(Outcome::Ok(Transaction::new(record, self)))
    }

    /// Send `amount` from the developer account to user `uid`.
    ///
    /// Requires the `balance` scope and a configured send path. On success
    /// the cached balance is updated and the new transaction is looked up.
    pub async fn pay(&self, uid: &str, amount: i64, note: Option<&str>) -> Result<Outcome<Transaction<'_>>, SdkError> {
        let user: i64 = uid
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidUserId(uid.to_string()))?;
        self.config.require_scope(Scope::Balance)?;
        validate_amount(amount)?;
        let url = self.config.endpoints().send()?;
        let notes = note.map(|n| self.prepare_note(n));

        let mut request = self
            .signed(url)
            .with_field("user", user.to_string())
            .with_field("amount", amount.to_string());
        if let Some(notes) = &notes {
            request = request.with_field("notes", notes.as_str());
        }
        let payload = self.dispatcher.push(request).await?;

        let envelope = ApiEnvelope::read(&payload);
        if !envelope.success {
            return Ok(self.fail(
                LOCATION,
                "pay",
                &envelope,
                [("user", json!(user)), ("amount", json!(amount)), ("notes", json!(notes))],
            ));
        }

        if let Some(balance) = types::balance(&payload) {
            self.set_balance(balance);
        }
        let id = types::transaction_id(&payload, "pay")?;
        self.get_transaction(&id).await
    }

    /// Balance of the developer account.
    pub async fn get_balance(&self) -> Result<Outcome<i64>, SdkError> {
        let request = self.signed(self.config.endpoints().balance()?);
        let payload = self.dispatcher.push(request).await?;

        let envelope = ApiEnvelope::read(&payload);
        if !envelope.success {
            return Ok(self.fail(LOCATION, "getBalance", &envelope, []));
        }

        let balance = types::balance(&payload).ok_or_else(|| SdkError::UnexpectedPayload {
            location: "getBalance",
            reason: "missing `balance`".to_string(),
        })?;
        self.set_balance(balance);
        Ok(Outcome::Ok(balance))
    }

    pub(crate) fn set_balance(&self, balance: i64) {
        *self.balance.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(balance);
    }

    /// Multipart POST to `url` carrying the client secret.
    pub(crate) fn signed(&self, url: String) -> HttpRequest {
        HttpRequest::post(url)
            .multipart()
            .with_field("secret", self.config.secret())
    }

    /// Publish a refusal on the `error` signal and wrap it as an outcome.
    pub(crate) fn fail<T, const N: usize>(
        &self,
        location: &str,
        method: &str,
        envelope: &ApiEnvelope,
        params: [(&str, Value); N],
    ) -> Outcome<T> {
        let failure = params
            .into_iter()
            .fold(ErrorEnvelope::new(location, method, envelope.reason()), |e, (k, v)| {
                e.with_param(k, v)
            });
        self.events.publish(&Event::Error(failure.clone()));
        Outcome::LogicalFailure(failure)
    }

    /// Cap a note at `NOTE_LIMIT` characters, warning when it had to be cut.
    pub(crate) fn prepare_note(&self, note: &str) -> String {
        if note.chars().count() <= NOTE_LIMIT {
            return note.to_string();
        }
        let mut truncated: String = note.chars().take(NOTE_KEEP).collect();
        truncated.push_str(NOTE_ELLIPSIS);
        self.events.publish(&Event::Warn(format!(
            "Transaction note exceeds {NOTE_LIMIT} characters and was truncated to \"{truncated}\""
        )));
        truncated
    }
}

impl Observable for GrowStocksClient {
    fn events(&self) -> &EventBus {
        &self.events
    }
}

pub(crate) fn validate_amount(amount: i64) -> Result<(), ConfigError> {
    if amount > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, Scripted};
    use std::sync::Mutex;

    fn client(scopes: &[Scope], transport: Arc<Scripted>) -> GrowStocksClient {
        GrowStocksClient::with_transport(config(scopes), transport)
    }

    fn collect_errors(client: &GrowStocksClient) -> Arc<Mutex<Vec<ErrorEnvelope>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        client.on_error(move |e| sink.lock().unwrap().push(e.clone()));
        errors
    }

    fn collect_warnings(client: &GrowStocksClient) -> Arc<Mutex<Vec<String>>> {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&warnings);
        client.on_warn(move |w| sink.lock().unwrap().push(w.to_string()));
        warnings
    }

    #[test]
    fn auth_url_uses_client_settings() {
        let c = client(&[Scope::Profile, Scope::Balance], Scripted::new([]));
        assert_eq!(
            c.auth_url(),
            "https://auth.growstocks.xyz/user/authorize?client=acme-code&scopes=profile%2Cbalance&redirect_uri=https%3A%2F%2Facme.example%2Fcallback"
        );
        assert_eq!(c.state(), ClientState::Constructed);
        assert_eq!(c.balance(), None);
    }

    #[tokio::test]
    async fn get_balance_updates_cache() {
        let transport = Scripted::new([json!({"success": true, "balance": 42})]);
        let c = client(&[Scope::Profile, Scope::Balance], transport.clone());

        let balance = c.get_balance().await.unwrap();
        assert_eq!(balance, Outcome::Ok(42));
        assert_eq!(c.balance(), Some(42));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://api.growstocks.xyz/v1/pay/balance");
        assert_eq!(seen[0].body.get("secret").map(String::as_str), Some("s3cr3t"));
        assert_eq!(seen[0].encoding, crate::http::BodyEncoding::Multipart);
    }

    #[tokio::test]
    async fn get_balance_refusal_is_published() {
        let c = client(&[Scope::Email], Scripted::new([json!({"success": false, "reason": "invalid_secret"})]));
        let errors = collect_errors(&c);

        let outcome = c.get_balance().await.unwrap();
        assert_eq!(outcome.failure().unwrap().reason, "invalid_secret");
        assert_eq!(c.balance(), None);
        assert_eq!(errors.lock().unwrap().len(), 1);
        assert_eq!(errors.lock().unwrap()[0].method, "getBalance");
    }

    #[tokio::test]
    async fn exchange_failure_reports_token() {
        let c = client(&[Scope::Profile], Scripted::new([json!({"success": false, "reason": "invalid_token"})]));
        let errors = collect_errors(&c);

        let outcome = c.exchange_auth_token("tok-1").await.unwrap();
        assert!(!outcome.is_ok());

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, "GrowStocksClient");
        assert_eq!(errors[0].method, "exchangeAuthToken");
        assert_eq!(errors[0].reason, "invalid_token");
        assert_eq!(errors[0].params.get("token"), Some(&json!("tok-1")));
        assert_eq!(c.state(), ClientState::Constructed);
    }

    #[tokio::test]
    async fn exchange_success_authorizes_client() {
        let transport = Scripted::new([json!({
            "success": true,
            "user": {"id": 7, "name": "Ann", "growid": "ANN", "balance": 15, "authorizedScopes": "profile,balance"}
        })]);
        let c = client(&[Scope::Profile, Scope::Balance], transport.clone());

        let user = c.exchange_auth_token("tok-1").await.unwrap().ok().unwrap();
        assert_eq!(user.id(), Some(7));
        assert_eq!(user.name(), Some("Ann"));
        assert!(user.has_scope("balance"));
        assert_eq!(user.token(), "tok-1");
        assert_eq!(c.state(), ClientState::Authorized);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://api.growstocks.xyz/v1/auth/user");
        assert_eq!(seen[0].body.get("token").map(String::as_str), Some("tok-1"));
    }

    #[tokio::test]
    async fn pay_validates_before_queueing() {
        let transport = Scripted::new([]);
        let c = client(&[Scope::Profile, Scope::Balance], transport.clone());

        let err = c.pay("seven", 1, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::InvalidUserId(_))));

        let err = c.pay("7", 0, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::InvalidAmount(0))));

        let no_balance = client(&[Scope::Profile], transport.clone());
        let err = no_balance.pay("7", 5, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::MissingScope(Scope::Balance))));

        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pay_truncates_note_then_fetches_transaction() {
        let transport = Scripted::new([
            json!({"success": true, "balance": 90, "transaction": "t1"}),
            json!({
                "success": true, "status": "Paid", "statusInteger": 1,
                "transaction": {"id": "t1", "user": 7, "party": 3, "amount": 10, "datetime": 0, "notes": "x"}
            }),
        ]);
        let c = client(&[Scope::Profile, Scope::Balance], transport.clone());
        let journal = Arc::clone(&transport.journal);
        c.on_warn(move |w| journal.lock().unwrap().push(format!("warn {w}")));
        let note = "n".repeat(60);

        let tx = c.pay("7", 10, Some(&note)).await.unwrap().ok().unwrap();
        assert_eq!(tx.id, "t1");
        assert!(tx.paid);
        assert_eq!(c.balance(), Some(90));

        // The truncation warning lands before anything reaches the transport.
        let journal = transport.journal.lock().unwrap().clone();
        assert_eq!(journal.len(), 3);
        assert!(journal[0].starts_with("warn "), "{journal:?}");
        assert_eq!(journal[1], "request https://api.growstocks.xyz/v1/pay/send");
        assert_eq!(journal[2], "request https://api.growstocks.xyz/v1/pay/transaction/get");

        let seen = transport.seen.lock().unwrap();
        let sent_note = seen[0].body.get("notes").unwrap();
        assert_eq!(sent_note.chars().count(), 49);
        assert!(sent_note.ends_with("..."));
        assert_eq!(&sent_note[..46], &note[..46]);
        assert_eq!(seen[0].url, "https://api.growstocks.xyz/v1/pay/send");
        assert_eq!(seen[0].body.get("user").map(String::as_str), Some("7"));
        assert_eq!(seen[1].url, "https://api.growstocks.xyz/v1/pay/transaction/get");
        assert_eq!(seen[1].body.get("transaction").map(String::as_str), Some("t1"));
    }

    #[tokio::test]
    async fn pay_refusal_keeps_balance() {
        let c = client(
            &[Scope::Email, Scope::Balance],
            Scripted::new([json!({"success": false, "reason": "insufficient_balance"})]),
        );
        let errors = collect_errors(&c);

        let outcome = c.pay("7", 1000, Some("rent")).await.unwrap();
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.reason, "insufficient_balance");
        assert_eq!(failure.params.get("amount"), Some(&json!(1000)));
        assert_eq!(failure.params.get("notes"), Some(&json!("rent")));
        assert_eq!(c.balance(), None);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_transaction_failure_is_not_an_error() {
        let c = client(&[Scope::Profile], Scripted::new([json!({"success": false})]));
        let outcome = c.get_transaction("fsgfe").await.unwrap();
        let failure = outcome.failure().unwrap();
        assert_eq!(failure.reason, "unknown");
        assert_eq!(failure.params.get("transaction"), Some(&json!("fsgfe")));
    }

    #[test]
    fn short_notes_pass_through_without_warning() {
        let c = client(&[Scope::Profile], Scripted::new([]));
        let warnings = collect_warnings(&c);
        let fifty = "a".repeat(50);
        assert_eq!(c.prepare_note(&fifty), fifty);
        assert!(warnings.lock().unwrap().is_empty());
    }

    #[test]
    fn secret_never_appears_in_envelopes() {
        let c = client(&[Scope::Profile], Scripted::new([]));
        let envelope = ApiEnvelope { success: false, reason: Some("nope".into()) };
        let outcome: Outcome<()> = c.fail(LOCATION, "getBalance", &envelope, []);
        let rendered = serde_json::to_string(outcome.failure().unwrap()).unwrap();
        assert!(!rendered.contains("s3cr3t"));
    }
}
