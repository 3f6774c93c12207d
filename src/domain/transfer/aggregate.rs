use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::props::{Address, Amount, AssetId, MerchantId, TransferId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressAmount {
    pub address: Address,
    pub amount: Amount,
}

impl AddressAmount {
    pub fn new(address: &str, amount: Decimal) -> Self {
        AddressAmount {
            address: Address(address.to_owned()),
            amount: Amount(amount),
        }
    }
}

/// Sum of the amounts, `None` on overflow.
pub fn total_amount(amounts: &[AddressAmount]) -> Option<Decimal> {
    amounts
        .iter()
        .try_fold(Decimal::ZERO, |total, a| total.checked_add(*a.amount))
}

// Input shape only, see `TransferMultiBijectivePayload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BiAddressAmount {
    pub source_address: Address,
    pub destination_address: Address,
    pub amount: Amount,
}

/// One many-sources to one-destination on-chain transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub source_amounts: Vec<AddressAmount>,
    pub destination_address: Address,
    /// Requested total. What actually moves is the sum of `source_amounts`.
    pub amount: Amount,
    pub asset_id: AssetId,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub count_confirm: u32,
}

impl TransactionRequest {
    /// `None` when the source amounts overflow a decimal.
    pub fn from_sources(
        source_amounts: Vec<AddressAmount>,
        destination_address: Address,
        asset_id: AssetId,
        count_confirm: u32,
    ) -> Option<Self> {
        let amount = total_amount(&source_amounts)?;

        Some(TransactionRequest {
            source_amounts,
            destination_address,
            amount: Amount(amount),
            asset_id,
            transaction_hash: None,
            count_confirm,
        })
    }

    pub fn is_executed(&self) -> bool {
        self.transaction_hash
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum TransferStatus {
    #[default]
    InProgress,
    Completed,
    Error,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::InProgress => "InProgress",
            TransferStatus::Completed => "Completed",
            TransferStatus::Error => "Error",
        }
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, String> {
        match value {
            "InProgress" => Ok(TransferStatus::InProgress),
            "Completed" => Ok(TransferStatus::Completed),
            "Error" => Ok(TransferStatus::Error),
            other => Err(format!("Unknown transfer status '{}'", other)),
        }
    }
}

/// Why a transfer ended up in `TransferStatus::Error`. `None` otherwise.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum TransferStatusError {
    #[default]
    None,
    NotConfirmed,
    /// Insufficient source funds. Only produced by the legacy single-transfer flow.
    InvalidAmount,
    InvalidAddress,
    InternalError,
    MerchantNotFound,
    MerchantHasNoWallets,
}

impl TransferStatusError {
    pub fn is_consistent_with(self, status: TransferStatus) -> bool {
        self == TransferStatusError::None || status == TransferStatus::Error
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatusError::None => "None",
            TransferStatusError::NotConfirmed => "NotConfirmed",
            TransferStatusError::InvalidAmount => "InvalidAmount",
            TransferStatusError::InvalidAddress => "InvalidAddress",
            TransferStatusError::InternalError => "InternalError",
            TransferStatusError::MerchantNotFound => "MerchantNotFound",
            TransferStatusError::MerchantHasNoWallets => "MerchantHasNoWallets",
        }
    }
}

impl TryFrom<&str> for TransferStatusError {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, String> {
        match value {
            "None" => Ok(TransferStatusError::None),
            "NotConfirmed" => Ok(TransferStatusError::NotConfirmed),
            "InvalidAmount" => Ok(TransferStatusError::InvalidAmount),
            "InvalidAddress" => Ok(TransferStatusError::InvalidAddress),
            "InternalError" => Ok(TransferStatusError::InternalError),
            "MerchantNotFound" => Ok(TransferStatusError::MerchantNotFound),
            "MerchantHasNoWallets" => Ok(TransferStatusError::MerchantHasNoWallets),
            other => Err(format!("Unknown transfer status error '{}'", other)),
        }
    }
}

// Aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub transfer_id: TransferId,
    pub merchant_id: MerchantId,
    pub create_date: DateTime<Utc>,
    pub transfer_status: TransferStatus,
    pub transfer_status_error: TransferStatusError,
    pub transaction_requests: Vec<TransactionRequest>,
}

impl TransferRequest {
    pub fn new(merchant_id: MerchantId, transaction_requests: Vec<TransactionRequest>) -> Self {
        TransferRequest {
            transfer_id: TransferId::generate(),
            merchant_id,
            create_date: Utc::now(),
            transfer_status: TransferStatus::InProgress,
            transfer_status_error: TransferStatusError::None,
            transaction_requests,
        }
    }

    /// The only shape failures are reported in: a fresh id, the current
    /// time, status `Error` and the given transactions attached as they are.
    pub fn error(
        merchant_id: MerchantId,
        error: TransferStatusError,
        transaction_requests: Vec<TransactionRequest>,
    ) -> Self {
        TransferRequest {
            transfer_id: TransferId::generate(),
            merchant_id,
            create_date: Utc::now(),
            transfer_status: TransferStatus::Error,
            transfer_status_error: error,
            transaction_requests,
        }
    }

    /// Independent copy to run a workflow on. Every list and string is
    /// owned, so nothing done to the copy is visible through `self`.
    pub fn working_copy(&self) -> Self {
        TransferRequest {
            transfer_id: self.transfer_id.clone(),
            merchant_id: self.merchant_id.clone(),
            create_date: self.create_date,
            transfer_status: self.transfer_status,
            transfer_status_error: self.transfer_status_error,
            transaction_requests: self.transaction_requests.to_vec(),
        }
    }

    pub fn set_status(&mut self, status: TransferStatus, error: TransferStatusError) {
        self.transfer_status = status;
        self.transfer_status_error = error;
    }

    /// An error reason is only carried alongside the `Error` status.
    pub fn has_consistent_status(&self) -> bool {
        self.transfer_status_error
            .is_consistent_with(self.transfer_status)
    }

    pub fn source_addresses(&self) -> impl Iterator<Item = &Address> {
        self.transaction_requests
            .iter()
            .flat_map(|t| t.source_amounts.iter().map(|s| &s.address))
    }
}
