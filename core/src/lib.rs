//! Async client SDK for the GrowStocks OAuth and Pay APIs.
//!
//! # Overview
//! `GrowStocksClient` holds the organisation's credentials and exposes the
//! remote operations: token exchange, transaction lookup, balance, pay, and
//! (through `GrowStocksUser`) billing. Calls from any number of tasks are
//! funnelled through one `Dispatcher` per client, which runs them strictly
//! one at a time in arrival order.
//!
//! # Design
//! - Three failure classes: `ConfigError` for bad input (fails before
//!   queueing), `SdkError` for transport and HTTP status failures, and
//!   `Outcome::LogicalFailure` when the API answers `success: false`.
//!   Logical failures are also published on the client's `error` signal.
//! - I/O lives behind the `Transport` trait; `ReqwestTransport` is the
//!   default, tests plug in scripted transports.
//! - Payload reconstruction (`types`) is pure and tolerant of missing
//!   fields.
//! - Users and transactions borrow their client rather than owning it.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod http;
pub mod outcome;
pub mod transaction;
pub mod transport;
pub mod types;
pub mod user;

#[cfg(test)]
mod testing;

pub use client::{ClientState, GrowStocksClient, NOTE_LIMIT};
pub use config::{ClientConfig, ClientConfigBuilder, ClientOptions, Scope, Secret};
pub use dispatcher::Dispatcher;
pub use endpoints::Endpoints;
pub use error::{ConfigError, SdkError};
pub use events::{Event, EventBus, Observable, Signal, SubscriptionId};
pub use http::{BodyEncoding, HttpMethod, HttpRequest, HttpResponse};
pub use outcome::{ErrorEnvelope, Outcome};
pub use transaction::Transaction;
pub use transport::{ReqwestTransport, Transport};
pub use types::{TransactionKind, TransactionRecord, UserRecord};
pub use user::{BillReceipt, GrowStocksUser};
