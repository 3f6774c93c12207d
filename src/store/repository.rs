use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::{
    domain::{props::TransferId, transfer::aggregate::TransferRequest},
    store::{StoreError, TransferRecord, TransferRepository, TransferStore, records_to_aggregates},
};

/// Upper bound on records written together in one round.
pub const SAVE_BATCH_SIZE: usize = 15;

/// Keeps each transfer as a partition of transaction records, keyed by
/// transaction hash inside the partition.
pub struct KeyedTransferRepository {
    store: Arc<dyn TransferStore>,
}

impl KeyedTransferRepository {
    pub fn new(store: Arc<dyn TransferStore>) -> Self {
        KeyedTransferRepository { store }
    }

    /// Rows of the partition that the new records don't overwrite: a
    /// placeholder or an older hash at a written position, or a position
    /// past the end of the transfer.
    async fn stale_records(
        &self,
        transfer_id: &TransferId,
        records: &[TransferRecord],
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let existing = self.store.get_partition(transfer_id).await?;

        Ok(existing
            .into_iter()
            .filter(|old| {
                records
                    .get(old.position as usize)
                    .is_none_or(|new| new.row_key != old.row_key)
            })
            .collect())
    }
}

#[async_trait]
impl TransferRepository for KeyedTransferRepository {
    async fn get_all(&self) -> Result<Vec<TransferRequest>, StoreError> {
        let records = self.store.get_all().await?;
        Ok(records_to_aggregates(records))
    }

    async fn get(&self, transfer_id: &TransferId) -> Result<Option<TransferRequest>, StoreError> {
        let records = self.store.get_partition(transfer_id).await?;
        Ok(records_to_aggregates(records).into_iter().next())
    }

    async fn get_transaction(
        &self,
        transfer_id: &TransferId,
        transaction_hash: &str,
    ) -> Result<Option<TransferRequest>, StoreError> {
        let record = self
            .store
            .get(transfer_id, transaction_hash)
            .await?
            .filter(|r| !r.is_pending());
        Ok(record.and_then(|r| records_to_aggregates(vec![r]).into_iter().next()))
    }

    async fn save(&self, transfer: &TransferRequest) -> Result<usize, StoreError> {
        let records = TransferRecord::fan_out(transfer);
        debug!(
            transfer_id = %transfer.transfer_id,
            records = records.len(),
            "Saving transfer"
        );

        if records.is_empty() {
            return Ok(0);
        }

        let stale = self.stale_records(&transfer.transfer_id, &records).await?;

        let batches = records
            .chunks(SAVE_BATCH_SIZE)
            .map(move |batch| try_join_all(batch.iter().map(move |record| self.store.upsert(record))));
        try_join_all(batches).await?;

        // Only once the new rows are in place.
        try_join_all(
            stale
                .iter()
                .map(|record| self.store.remove(&record.transfer_id, &record.row_key)),
        )
        .await?;

        Ok(records.len())
    }
}
