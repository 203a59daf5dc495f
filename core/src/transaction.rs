//! A pay transaction bound to the client that looked it up.

use std::fmt;
use std::ops::Deref;

use crate::client::GrowStocksClient;
use crate::error::SdkError;
use crate::outcome::Outcome;
use crate::types::TransactionRecord;

/// Immutable view of a transaction. Fields are reached through `Deref`.
pub struct Transaction<'c> {
    record: TransactionRecord,
    client: &'c GrowStocksClient,
}

impl<'c> Transaction<'c> {
    pub(crate) fn new(record: TransactionRecord, client: &'c GrowStocksClient) -> Self {
        Self { record, client }
    }

    pub fn client(&self) -> &'c GrowStocksClient {
        self.client
    }

    pub fn into_record(self) -> TransactionRecord {
        self.record
    }

    /// Look the transaction up again, e.g. to see whether a bill was paid.
    pub async fn refresh(&self) -> Result<Outcome<Transaction<'c>>, SdkError> {
        self.client.get_transaction(&self.record.id).await
    }
}

impl Deref for Transaction<'_> {
    type Target = TransactionRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("record", &self.record)
            .field("client", &self.client.config().client_code())
            .finish()
    }
}
