use derive_more::{Display, From};

use crate::{blockchain::BlockchainError, publisher::PublishError, store::StoreError};

/// Rejections of an incoming payload, before any transfer is attempted.
#[derive(Debug, PartialEq, Display)]
pub enum PayloadError {
    #[display("Merchant id can not be empty.")]
    EmptyMerchantId,
    #[display("List of source addresses can not be empty.")]
    NoSources,
    #[display("List of destination addresses can not be empty.")]
    NoDestinations,
    #[display("List of address pairs can not be empty.")]
    NoAddressPairs,
    #[display("Some address has the requested transfer amount < 0. The transfer is impossible.")]
    NegativeAmount,
    #[display(
        "Some destination address has the requested transfer amount <= 0. The transfer is impossible."
    )]
    NonPositiveAmount,
    #[display("Transfer model is malformed. Checkup list of sources and destinations.")]
    Malformed,
    #[display("Transfer id can not be empty.")]
    EmptyTransferId,
    #[display("Transfer status error can only be set together with the Error status.")]
    InconsistentStatus,
}

impl std::error::Error for PayloadError {}

/// Infrastructure failures. Expected failure modes never end up here,
/// they are reported as a transfer in `Error` status.
#[derive(Debug, Display, From)]
pub enum TransferServiceError {
    #[display("Storage failure: {_0}")]
    Storage(StoreError),
    #[display("Blockchain client failure: {_0}")]
    Blockchain(BlockchainError),
    #[display("Publishing failure: {_0}")]
    Publish(PublishError),
}

impl std::error::Error for TransferServiceError {}
