use async_trait::async_trait;
use derive_more::Display;

use crate::domain::{props::TransferId, transfer::aggregate::TransferRequest};

pub mod record;
pub mod repository;
pub mod sqlite;
pub mod wallet;

pub use record::{TransferRecord, records_to_aggregates};
pub use repository::KeyedTransferRepository;
pub use sqlite::{SqliteTransferStore, init_transfers_table};
pub use wallet::{SqliteWalletRepository, init_wallet_tables};

#[derive(Debug, Display)]
pub enum StoreError {
    #[display("Database error: {_0}")]
    Database(String),
    #[display("Stored data is corrupted: {_0}")]
    Corrupted(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

/// Flat record storage partitioned by transfer id and keyed by row key
/// within a partition.
#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<TransferRecord>, StoreError>;

    async fn get_partition(&self, transfer_id: &str) -> Result<Vec<TransferRecord>, StoreError>;

    async fn get(
        &self,
        transfer_id: &str,
        row_key: &str,
    ) -> Result<Option<TransferRecord>, StoreError>;

    /// Insert or replace by (transfer id, row key). Never fails on an
    /// existing row.
    async fn upsert(&self, record: &TransferRecord) -> Result<(), StoreError>;

    async fn remove(&self, transfer_id: &str, row_key: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<TransferRequest>, StoreError>;

    async fn get(&self, transfer_id: &TransferId) -> Result<Option<TransferRequest>, StoreError>;

    async fn get_transaction(
        &self,
        transfer_id: &TransferId,
        transaction_hash: &str,
    ) -> Result<Option<TransferRequest>, StoreError>;

    /// Returns how many transaction records were written. Zero means
    /// nothing was stored.
    async fn save(&self, transfer: &TransferRequest) -> Result<usize, StoreError>;
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> sqlx::SqlitePool {
    // A single connection that never gets recycled, otherwise the
    // in-memory database would vanish with it.
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}
