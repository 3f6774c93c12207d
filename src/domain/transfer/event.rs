use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::transfer::aggregate::{TransactionRequest, TransferRequest};

/// State of a transfer as broadcast after every persisted change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequestMessage {
    pub transfer_id: String,
    pub merchant_id: String,
    pub create_date: DateTime<Utc>,
    pub transfer_status: String,
    pub transfer_status_error: String,
    pub transaction_requests: Vec<TransactionRequest>,
}

impl From<&TransferRequest> for TransferRequestMessage {
    fn from(t: &TransferRequest) -> Self {
        TransferRequestMessage {
            transfer_id: t.transfer_id.to_string(),
            merchant_id: t.merchant_id.to_string(),
            create_date: t.create_date,
            transfer_status: t.transfer_status.as_str().to_owned(),
            transfer_status_error: t.transfer_status_error.as_str().to_owned(),
            transaction_requests: t.transaction_requests.clone(),
        }
    }
}
