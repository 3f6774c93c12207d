use async_trait::async_trait;
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    props::{Address, AssetId},
    transfer::aggregate::AddressAmount,
};

pub mod http;

pub use http::HttpBlockchainClient;

/// A many-sources to one-destination value transfer as sent to the network.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultipleTransferRequest {
    /// Idempotency key, lets the blockchain service drop a repeated submission.
    pub transaction_id: String,
    pub destination: Address,
    pub asset: AssetId,
    pub fee_rate: u32,
    pub fixed_fee: Decimal,
    pub sources: Vec<AddressAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainTransaction {
    pub transaction_id: String,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
pub enum OnchainErrorKind {
    #[serde(rename = "NotEnoughBitcoinAvailable")]
    NotEnoughFunds,
    InvalidAddress,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainError {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "errorCode", default = "unknown_kind")]
    pub kind: OnchainErrorKind,
}

fn unknown_kind() -> OnchainErrorKind {
    OnchainErrorKind::Unknown
}

#[derive(Debug, Clone, PartialEq)]
pub enum OnchainOutcome {
    Submitted(OnchainTransaction),
    Rejected(OnchainError),
}

#[derive(Debug, Display)]
pub enum BlockchainError {
    #[display("Could not build blockchain client: {_0}")]
    Setup(String),
    #[display("Blockchain API unreachable: {_0}")]
    Transport(String),
}

impl std::error::Error for BlockchainError {}

#[async_trait]
pub trait BlockchainTransferClient: Send + Sync {
    /// `Ok(None)` means the service gave no usable answer, which callers
    /// treat like a rejected transfer. `Err` is reserved for the client
    /// failing to talk to the service at all.
    async fn transfer_multiple(
        &self,
        request: MultipleTransferRequest,
    ) -> Result<Option<OnchainOutcome>, BlockchainError>;
}
