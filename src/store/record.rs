use chrono::{DateTime, Utc};

use crate::domain::{
    props::{Address, Amount, AssetId, MerchantId, TransferId},
    transfer::aggregate::{
        AddressAmount, TransactionRequest, TransferRequest, TransferStatus, TransferStatusError,
    },
};

const PENDING_ROW_KEY_PREFIX: &str = "pending-";

/// One stored row: a transaction together with a copy of its transfer's header.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub transfer_id: String,
    pub row_key: String,
    pub position: u32,
    pub merchant_id: String,
    pub transfer_status: TransferStatus,
    pub transfer_status_error: TransferStatusError,
    pub created_date: DateTime<Utc>,
    pub transaction_hash: Option<String>,
    pub source_amounts: Vec<AddressAmount>,
    pub destination_address: String,
    pub amount: Amount,
    pub asset_id: String,
    pub count_confirm: u32,
}

/// Row key of a transaction that has no hash yet.
pub fn pending_row_key(position: u32) -> String {
    format!("{}{}", PENDING_ROW_KEY_PREFIX, position)
}

impl TransferRecord {
    /// One record per transaction. A transaction is keyed by its hash once it
    /// has one and by its position until then.
    pub fn fan_out(transfer: &TransferRequest) -> Vec<TransferRecord> {
        transfer
            .transaction_requests
            .iter()
            .zip(0u32..)
            .map(|(tx, position)| TransferRecord {
                transfer_id: transfer.transfer_id.to_string(),
                row_key: match &tx.transaction_hash {
                    Some(hash) if tx.is_executed() => hash.clone(),
                    _ => pending_row_key(position),
                },
                position,
                merchant_id: transfer.merchant_id.to_string(),
                transfer_status: transfer.transfer_status,
                transfer_status_error: transfer.transfer_status_error,
                created_date: transfer.create_date,
                transaction_hash: tx.transaction_hash.clone(),
                source_amounts: tx.source_amounts.clone(),
                destination_address: tx.destination_address.to_string(),
                amount: tx.amount,
                asset_id: tx.asset_id.to_string(),
                count_confirm: tx.count_confirm,
            })
            .collect()
    }

    pub fn is_pending(&self) -> bool {
        self.transaction_hash.as_deref().is_none_or(str::is_empty)
    }

    fn to_transaction_request(&self) -> TransactionRequest {
        TransactionRequest {
            source_amounts: self.source_amounts.clone(),
            destination_address: Address(self.destination_address.clone()),
            amount: self.amount,
            asset_id: AssetId(self.asset_id.clone()),
            transaction_hash: self.transaction_hash.clone(),
            count_confirm: self.count_confirm,
        }
    }
}

/// Rebuilds aggregates from flat records, in any order. The header of each
/// transfer comes from its first record; transactions keep their original
/// order. Where a hashed row and a leftover placeholder share a position,
/// the hashed row wins.
pub fn records_to_aggregates(mut records: Vec<TransferRecord>) -> Vec<TransferRequest> {
    records.sort_by(|a, b| {
        a.transfer_id
            .cmp(&b.transfer_id)
            .then(a.position.cmp(&b.position))
            .then(a.is_pending().cmp(&b.is_pending()))
    });
    records.dedup_by(|later, kept| {
        later.transfer_id == kept.transfer_id && later.position == kept.position
    });

    records
        .chunk_by(|a, b| a.transfer_id == b.transfer_id)
        .filter_map(|group| {
            let head = group.first()?;
            Some(TransferRequest {
                transfer_id: TransferId(head.transfer_id.clone()),
                merchant_id: MerchantId(head.merchant_id.clone()),
                create_date: head.created_date,
                transfer_status: head.transfer_status,
                transfer_status_error: head.transfer_status_error,
                transaction_requests: group.iter().map(|r| r.to_transaction_request()).collect(),
            })
        })
        .collect()
}
