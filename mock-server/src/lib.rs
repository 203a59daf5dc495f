//! In-memory imitation of the GrowStocks auth and pay APIs.
//!
//! Accepts `multipart/form-data` POST bodies like the real service and
//! answers HTTP 200 with a `success` flag for every well-formed request,
//! reporting refusals through `reason`. Requests that are not multipart are
//! rejected by the extractor with a 4xx status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const MOCK_SECRET: &str = "mock-secret";
pub const MOCK_TOKEN: &str = "mock-token";
pub const MOCK_USER_ID: i64 = 7;
pub const MOCK_DEVELOPER_ID: i64 = 3;
pub const MOCK_DEVELOPER_BALANCE: i64 = 1_000;
pub const BALANCE_PATH: &str = "/balance";
pub const SEND_PATH: &str = "/send";

/// `transaction.action` for a user paying the developer.
const RECEIVE_ACTION: i64 = 5;
const SEND_ACTION: i64 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub growid: String,
    pub balance: i64,
    #[serde(rename = "authorizedScopes")]
    pub authorized_scopes: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user: i64,
    pub party: i64,
    pub amount: i64,
    pub action: i64,
    pub datetime: i64,
    pub notes: String,
    #[serde(skip)]
    pub paid: bool,
}

#[derive(Debug)]
pub struct Ledger {
    pub secret: String,
    pub developer_id: i64,
    pub developer_balance: i64,
    /// Users keyed by their OAuth token.
    pub users: HashMap<String, User>,
    pub transactions: HashMap<String, Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        let user = User {
            id: MOCK_USER_ID,
            name: "Ann".to_string(),
            growid: "ANN".to_string(),
            balance: 500,
            authorized_scopes: "profile,balance".to_string(),
        };
        Self {
            secret: MOCK_SECRET.to_string(),
            developer_id: MOCK_DEVELOPER_ID,
            developer_balance: MOCK_DEVELOPER_BALANCE,
            users: HashMap::from([(MOCK_TOKEN.to_string(), user)]),
            transactions: HashMap::new(),
        }
    }
}

pub type Db = Arc<RwLock<Ledger>>;

pub fn app() -> Router {
    app_with(Ledger::default())
}

pub fn app_with(ledger: Ledger) -> Router {
    let db: Db = Arc::new(RwLock::new(ledger));
    Router::new()
        .route("/v1/auth/user", post(user_info))
        .route("/v1/pay/transaction/create", post(create_transaction))
        .route("/v1/pay/transaction/get", post(get_transaction))
        .route(&format!("/v1/pay{BALANCE_PATH}"), post(balance))
        .route(&format!("/v1/pay{SEND_PATH}"), post(send))
        .route("/pay", get(approve))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

type Fields = HashMap<String, String>;

async fn fields(mut multipart: Multipart) -> Result<Fields, StatusCode> {
    let mut fields = Fields::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        fields.insert(name, value);
    }
    Ok(fields)
}

fn refuse(reason: &str) -> Json<Value> {
    Json(json!({"success": false, "reason": reason}))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn authenticated(ledger: &Ledger, fields: &Fields) -> bool {
    fields.get("secret").is_some_and(|s| *s == ledger.secret)
}

fn positive_amount(fields: &Fields) -> Option<i64> {
    fields.get("amount").and_then(|a| a.parse().ok()).filter(|a: &i64| *a > 0)
}

fn transaction_json(tx: &Transaction) -> Value {
    json!({
        "success": true,
        "status": if tx.paid { "Paid" } else { "Not Paid" },
        "statusInteger": i64::from(tx.paid),
        "transaction": tx,
    })
}

async fn user_info(State(db): State<Db>, multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let fields = fields(multipart).await?;
    let ledger = db.read().await;
    if !authenticated(&ledger, &fields) {
        return Ok(refuse("invalid_secret"));
    }
    let user = fields.get("token").and_then(|t| ledger.users.get(t));
    Ok(match user {
        Some(user) => Json(json!({"success": true, "user": user})),
        None => refuse("invalid_token"),
    })
}

async fn create_transaction(State(db): State<Db>, multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let fields = fields(multipart).await?;
    let mut ledger = db.write().await;
    if !authenticated(&ledger, &fields) {
        return Ok(refuse("invalid_secret"));
    }
    let Some(user_id) = fields.get("token").and_then(|t| ledger.users.get(t)).map(|u| u.id) else {
        return Ok(refuse("invalid_token"));
    };
    let Some(amount) = positive_amount(&fields) else {
        return Ok(refuse("invalid_amount"));
    };

    let tx = Transaction {
        id: Uuid::new_v4().simple().to_string(),
        user: user_id,
        party: ledger.developer_id,
        amount,
        action: RECEIVE_ACTION,
        datetime: now_millis(),
        notes: fields.get("notes").cloned().unwrap_or_default(),
        paid: false,
    };
    let id = tx.id.clone();
    ledger.transactions.insert(id.clone(), tx);
    Ok(Json(json!({"success": true, "transaction": id})))
}

async fn get_transaction(State(db): State<Db>, multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let fields = fields(multipart).await?;
    let ledger = db.read().await;
    if !authenticated(&ledger, &fields) {
        return Ok(refuse("invalid_secret"));
    }
    Ok(match fields.get("transaction").and_then(|id| ledger.transactions.get(id)) {
        Some(tx) => Json(transaction_json(tx)),
        None => refuse("transaction_not_found"),
    })
}

async fn balance(State(db): State<Db>, multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let fields = fields(multipart).await?;
    let ledger = db.read().await;
    if !authenticated(&ledger, &fields) {
        return Ok(refuse("invalid_secret"));
    }
    Ok(Json(json!({"success": true, "balance": ledger.developer_balance})))
}

async fn send(State(db): State<Db>, multipart: Multipart) -> Result<Json<Value>, StatusCode> {
    let fields = fields(multipart).await?;
    let mut ledger = db.write().await;
    if !authenticated(&ledger, &fields) {
        return Ok(refuse("invalid_secret"));
    }
    let Some(user_id) = fields.get("user").and_then(|u| u.parse::<i64>().ok()) else {
        return Ok(refuse("invalid_user"));
    };
    let Some(amount) = positive_amount(&fields) else {
        return Ok(refuse("invalid_amount"));
    };
    if amount > ledger.developer_balance {
        return Ok(refuse("insufficient_balance"));
    }
    let Some(recipient) = ledger.users.values_mut().find(|u| u.id == user_id) else {
        return Ok(refuse("invalid_user"));
    };
    recipient.balance += amount;
    ledger.developer_balance -= amount;

    let tx = Transaction {
        id: Uuid::new_v4().simple().to_string(),
        user: user_id,
        party: ledger.developer_id,
        amount,
        action: SEND_ACTION,
        datetime: now_millis(),
        notes: fields.get("notes").cloned().unwrap_or_default(),
        paid: true,
    };
    let id = tx.id.clone();
    ledger.transactions.insert(id.clone(), tx);
    Ok(Json(json!({"success": true, "transaction": id, "balance": ledger.developer_balance})))
}

#[derive(Deserialize)]
pub struct ApproveQuery {
    pub client: String,
    pub redirect_uri: String,
    pub transaction: String,
}

/// Stand-in for the user approving a bill on the payment site.
async fn approve(State(db): State<Db>, Query(query): Query<ApproveQuery>) -> Result<Json<Value>, StatusCode> {
    let mut ledger = db.write().await;
    let ledger = &mut *ledger;
    let tx = ledger
        .transactions
        .get_mut(&query.transaction)
        .ok_or(StatusCode::NOT_FOUND)?;
    if !tx.paid {
        let payer = ledger
            .users
            .values_mut()
            .find(|u| u.id == tx.user)
            .ok_or(StatusCode::NOT_FOUND)?;
        if payer.balance < tx.amount {
            return Ok(refuse("insufficient_balance"));
        }
        payer.balance -= tx.amount;
        ledger.developer_balance += tx.amount;
        tx.paid = true;
    }
    Ok(Json(json!({
        "success": true,
        "client": query.client,
        "redirect": format!("{}?transaction={}", query.redirect_uri, query.transaction),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_with_api_field_names() {
        let user = Ledger::default().users.remove(MOCK_TOKEN).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], MOCK_USER_ID);
        assert_eq!(json["authorizedScopes"], "profile,balance");
    }

    #[test]
    fn transaction_json_reports_status() {
        let mut tx = Transaction {
            id: "t1".to_string(),
            user: 7,
            party: 3,
            amount: 100,
            action: RECEIVE_ACTION,
            datetime: 0,
            notes: "hi".to_string(),
            paid: false,
        };
        let json = transaction_json(&tx);
        assert_eq!(json["status"], "Not Paid");
        assert_eq!(json["statusInteger"], 0);
        assert!(json["transaction"].get("paid").is_none());

        tx.paid = true;
        let json = transaction_json(&tx);
        assert_eq!(json["status"], "Paid");
        assert_eq!(json["statusInteger"], 1);
        assert_eq!(json["transaction"]["party"], 3);
    }

    #[test]
    fn amounts_must_be_positive_integers() {
        let f = |v: &str| Fields::from([("amount".to_string(), v.to_string())]);
        assert_eq!(positive_amount(&f("12")), Some(12));
        assert_eq!(positive_amount(&f("0")), None);
        assert_eq!(positive_amount(&f("-4")), None);
        assert_eq!(positive_amount(&f("ten")), None);
    }
}
