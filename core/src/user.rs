//! A GrowStocks user obtained through a token exchange.

use std::fmt;

use serde_json::json;

use crate::client::{validate_amount, GrowStocksClient};
use crate::config::{Scope, Secret};
use crate::error::{ConfigError, SdkError};
use crate::outcome::Outcome;
use crate::types::{self, ApiEnvelope, UserRecord};

const LOCATION: &str = "GrowStocksUser";

/// Result of a successful `bill`: where to send the user to approve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillReceipt {
    pub transaction_id: String,
    pub user_redirect_url: String,
}

pub struct GrowStocksUser<'c> {
    record: UserRecord,
    token: Secret,
    client: &'c GrowStocksClient,
}

impl<'c> GrowStocksUser<'c> {
    pub(crate) fn new(record: UserRecord, token: &str, client: &'c GrowStocksClient) -> Self {
        Self {
            record,
            token: Secret::new(token),
            client,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.record.id
    }

    pub fn name(&self) -> Option<&str> {
        self.record.name.as_deref()
    }

    pub fn growid(&self) -> Option<&str> {
        self.record.growid.as_deref()
    }

    pub fn balance(&self) -> Option<i64> {
        self.record.balance
    }

    /// Scopes the user granted, as reported at the last exchange.
    pub fn scopes(&self) -> Option<&[String]> {
        self.record.scopes.as_deref()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().is_some_and(|scopes| scopes.iter().any(|s| s == scope))
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn client(&self) -> &'c GrowStocksClient {
        self.client
    }

    pub fn record(&self) -> &UserRecord {
        &self.record
    }

    /// Create a transaction charging this user `amount`.
    ///
    /// The user still has to approve it at `BillReceipt::user_redirect_url`.
    pub async fn bill(&self, amount: i64, note: Option<&str>) -> Result<Outcome<BillReceipt>, SdkError> {
        let config = self.client.config();
        config.require_scope(Scope::Balance)?;
        let pay_redirect_url = config.pay_redirect_url().ok_or(ConfigError::MissingPayRedirect)?;
        validate_amount(amount)?;
        let notes = note.map(|n| self.client.prepare_note(n));

        let mut request = self
            .client
            .signed(config.endpoints().create_transaction())
            .with_field("token", self.token())
            .with_field("amount", amount.to_string());
        if let Some(notes) = &notes {
            request = request.with_field("notes", notes.as_str());
        }
        let payload = self.client.dispatcher().push(request).await?;

        let envelope = ApiEnvelope::read(&payload);
        if !envelope.success {
            return Ok(self.client.fail(
                LOCATION,
                "bill",
                &envelope,
                [("amount", json!(amount)), ("notes", json!(notes))],
            ));
        }

        let transaction_id = types::transaction_id(&payload, "bill")?;
        let user_redirect_url = config
            .endpoints()
            .pay_authorize(config.client_code(), pay_redirect_url, &transaction_id);
        Ok(Outcome::Ok(BillReceipt {
            transaction_id,
            user_redirect_url,
        }))
    }

    /// Re-exchange this user's token and copy the fresh name, growid and
    /// balance in place.
    ///
    /// Returns `false` when the API refused the token; the refusal has then
    /// been published on the client's `error` signal and nothing was changed.
    pub async fn refresh_user_data(&mut self) -> Result<bool, SdkError> {
        match self.client.fetch_user(self.token.expose()).await? {
            Outcome::Ok(fresh) => {
                self.record.name = fresh.name;
                self.record.growid = fresh.growid;
                self.record.balance = fresh.balance;
                Ok(true)
            }
            Outcome::LogicalFailure(_) => Ok(false),
        }
    }
}

impl fmt::Debug for GrowStocksUser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowStocksUser")
            .field("record", &self.record)
            .field("token", &self.token)
            .field("client", &self.client.config().client_code())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Observable;
    use crate::testing::{config, Scripted};
    use std::sync::{Arc, Mutex};

    fn exchange_reply(name: &str, balance: i64) -> serde_json::Value {
        json!({
            "success": true,
            "user": {"id": 7, "name": name, "growid": "ANN", "balance": balance, "authorizedScopes": "profile,balance"}
        })
    }

    #[tokio::test]
    async fn bill_returns_redirect() {
        let transport = Scripted::new([
            exchange_reply("Ann", 10),
            json!({"success": true, "transaction": "tx-1"}),
        ]);
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile, Scope::Balance]), transport.clone());
        let user = client.exchange_auth_token("tok").await.unwrap().ok().unwrap();

        let receipt = user.bill(25, Some("order #1")).await.unwrap().ok().unwrap();
        assert_eq!(receipt.transaction_id, "tx-1");
        assert_eq!(
            receipt.user_redirect_url,
            "https://pay.growstocks.xyz/pay?client=acme-code&redirect_uri=https%3A%2F%2Facme.example%2Fpaid&transaction=tx-1"
        );

        let seen = transport.seen.lock().unwrap();
        let create = &seen[1];
        assert_eq!(create.url, "https://api.growstocks.xyz/v1/pay/transaction/create");
        assert_eq!(create.body.get("token").map(String::as_str), Some("tok"));
        assert_eq!(create.body.get("amount").map(String::as_str), Some("25"));
        assert_eq!(create.body.get("notes").map(String::as_str), Some("order #1"));
        assert_eq!(create.body.get("secret").map(String::as_str), Some("s3cr3t"));
    }

    #[tokio::test]
    async fn bill_preconditions_are_hard_errors() {
        let transport = Scripted::new([exchange_reply("Ann", 10), exchange_reply("Ann", 10)]);

        let profile_only = GrowStocksClient::with_transport(config(&[Scope::Profile]), transport.clone());
        let user = profile_only.exchange_auth_token("tok").await.unwrap().ok().unwrap();
        let err = user.bill(5, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::MissingScope(Scope::Balance))));

        let no_redirect = crate::config::ClientConfig::builder()
            .organisation("Acme")
            .url("https://acme.example")
            .client_code("acme-code")
            .secret("s3cr3t")
            .redirect_url("https://acme.example/callback")
            .scopes([Scope::Profile, Scope::Balance])
            .build()
            .unwrap();
        let client = GrowStocksClient::with_transport(no_redirect, transport.clone());
        let user = client.exchange_auth_token("tok").await.unwrap().ok().unwrap();
        let err = user.bill(5, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::MissingPayRedirect)));

        let full = GrowStocksClient::with_transport(config(&[Scope::Profile, Scope::Balance]), transport.clone());
        let user = GrowStocksUser::new(UserRecord::default(), "tok", &full);
        let err = user.bill(-3, None).await.unwrap_err();
        assert!(matches!(err, SdkError::Config(ConfigError::InvalidAmount(-3))));

        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bill_truncates_long_notes_with_warning() {
        let transport = Scripted::new([json!({"success": true, "transaction": {"id": "tx-2"}})]);
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile, Scope::Balance]), transport.clone());
        let journal = Arc::clone(&transport.journal);
        client.on_warn(move |w| journal.lock().unwrap().push(format!("warn {w}")));

        let user = GrowStocksUser::new(UserRecord::default(), "tok", &client);
        let note = "0123456789".repeat(6);
        let receipt = user.bill(1, Some(&note)).await.unwrap().ok().unwrap();
        assert_eq!(receipt.transaction_id, "tx-2");

        let sent = transport.seen.lock().unwrap()[0].body.get("notes").cloned().unwrap();
        assert_eq!(sent, format!("{}...", &note[..46]));

        let journal = transport.journal.lock().unwrap().clone();
        assert_eq!(journal.len(), 2);
        assert!(journal[0].starts_with("warn "), "{journal:?}");
        assert_eq!(journal[1], "request https://api.growstocks.xyz/v1/pay/transaction/create");
    }

    #[tokio::test]
    async fn bill_refusal_goes_to_client_channel() {
        let transport = Scripted::new([json!({"success": false, "reason": "invalid_token"})]);
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile, Scope::Balance]), transport);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        client.on_error(move |e| sink.lock().unwrap().push(e.clone()));

        let user = GrowStocksUser::new(UserRecord::default(), "tok", &client);
        let outcome = user.bill(3, None).await.unwrap();
        assert!(!outcome.is_ok());

        let errors = errors.lock().unwrap();
        assert_eq!(errors[0].location, "GrowStocksUser");
        assert_eq!(errors[0].method, "bill");
        assert_eq!(errors[0].params.get("amount"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn refresh_copies_fresh_fields() {
        let transport = Scripted::new([exchange_reply("Ann", 10), exchange_reply("Annie", 55)]);
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile]), transport.clone());
        let mut user = client.exchange_auth_token("tok").await.unwrap().ok().unwrap();

        assert!(user.refresh_user_data().await.unwrap());
        assert_eq!(user.name(), Some("Annie"));
        assert_eq!(user.balance(), Some(55));
        assert_eq!(user.token(), "tok");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[1].body.get("token").map(String::as_str), Some("tok"));
    }

    #[tokio::test]
    async fn refresh_refusal_leaves_user_untouched() {
        let transport = Scripted::new([
            exchange_reply("Ann", 10),
            json!({"success": false, "reason": "token_expired"}),
        ]);
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile]), transport);
        let mut user = client.exchange_auth_token("tok").await.unwrap().ok().unwrap();

        assert!(!user.refresh_user_data().await.unwrap());
        assert_eq!(user.name(), Some("Ann"));
        assert_eq!(user.balance(), Some(10));
    }

    #[test]
    fn debug_hides_token() {
        let client = GrowStocksClient::with_transport(config(&[Scope::Profile]), Scripted::new([]));
        let user = GrowStocksUser::new(UserRecord::default(), "very-secret-token", &client);
        assert!(!format!("{user:?}").contains("very-secret-token"));
    }
}
