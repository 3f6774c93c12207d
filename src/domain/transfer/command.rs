use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{
    props::{Address, AssetId, MerchantId, TransferId},
    transfer::{
        aggregate::{
            AddressAmount, BiAddressAmount, TransactionRequest, TransferRequest, TransferStatus,
            TransferStatusError, total_amount,
        },
        error::PayloadError,
    },
};

// Confirmations a freshly mapped transaction asks for.
const DEFAULT_COUNT_CONFIRM: u32 = 1;

/// Many sources feeding many destinations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCrosswisePayload {
    pub merchant_id: MerchantId,
    pub sources: Vec<AddressAmount>,
    pub destinations: Vec<AddressAmount>,
}

impl TransferCrosswisePayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        require_merchant(&self.merchant_id)?;

        if self.sources.is_empty() {
            return Err(PayloadError::NoSources);
        }

        if self.destinations.is_empty() {
            return Err(PayloadError::NoDestinations);
        }

        if self
            .sources
            .iter()
            .chain(self.destinations.iter())
            .any(|a| *a.amount < Decimal::ZERO)
        {
            return Err(PayloadError::NegativeAmount);
        }

        Ok(())
    }

    /// Splits the sources over the destinations, both walked in list order.
    /// Each destination becomes one transaction funded by the source slices
    /// that cover it. Returns `None` when the lists can't be matched up.
    pub fn to_transfer_request(&self, asset_id: &AssetId) -> Option<TransferRequest> {
        let sources: Vec<AddressAmount> = self
            .sources
            .iter()
            .filter(|s| *s.amount > Decimal::ZERO)
            .cloned()
            .collect();
        let destinations: Vec<AddressAmount> = self
            .destinations
            .iter()
            .filter(|d| *d.amount > Decimal::ZERO)
            .cloned()
            .collect();

        if sources.is_empty() || destinations.is_empty() {
            return None;
        }

        let sources_total = total_amount(&sources)?;
        let destinations_total = total_amount(&destinations)?;
        if sources_total != destinations_total {
            return None;
        }

        let mut transactions = Vec::with_capacity(destinations.len());
        let mut source_idx = 0;
        let mut source_left = *sources[0].amount;

        for destination in destinations {
            let mut needed = *destination.amount;
            let mut slices: Vec<AddressAmount> = Vec::new();

            while needed > Decimal::ZERO {
                let source = sources.get(source_idx)?;
                let taken = needed.min(source_left);

                add_slice(&mut slices, &source.address, taken);
                needed -= taken;
                source_left -= taken;

                if source_left.is_zero() {
                    source_idx += 1;
                    source_left = sources
                        .get(source_idx)
                        .map(|s| *s.amount)
                        .unwrap_or_default();
                }
            }

            transactions.push(TransactionRequest::from_sources(
                slices,
                destination.address.clone(),
                asset_id.clone(),
                DEFAULT_COUNT_CONFIRM,
            )?);
        }

        Some(TransferRequest::new(self.merchant_id.clone(), transactions))
    }
}

/// Explicit (source, destination, amount) triples.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMultiBijectivePayload {
    pub merchant_id: MerchantId,
    pub bi_addresses: Vec<BiAddressAmount>,
}

impl TransferMultiBijectivePayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        require_merchant(&self.merchant_id)?;

        if self.bi_addresses.is_empty() {
            return Err(PayloadError::NoAddressPairs);
        }

        if self.bi_addresses.iter().any(|b| *b.amount <= Decimal::ZERO) {
            return Err(PayloadError::NonPositiveAmount);
        }

        Ok(())
    }

    /// `None` when an amount can't be represented.
    pub fn to_transfer_request(&self, asset_id: &AssetId) -> Option<TransferRequest> {
        let transactions = self
            .bi_addresses
            .iter()
            .map(|b| {
                TransactionRequest::from_sources(
                    vec![AddressAmount {
                        address: b.source_address.clone(),
                        amount: b.amount,
                    }],
                    b.destination_address.clone(),
                    asset_id.clone(),
                    DEFAULT_COUNT_CONFIRM,
                )
            })
            .collect::<Option<Vec<_>>>()?;

        Some(TransferRequest::new(self.merchant_id.clone(), transactions))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransferStatusPayload {
    pub transfer_id: TransferId,
    pub transfer_status: TransferStatus,
    #[serde(default)]
    pub transfer_status_error: TransferStatusError,
}

impl UpdateTransferStatusPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.transfer_id.trim().is_empty() {
            return Err(PayloadError::EmptyTransferId);
        }

        if !self
            .transfer_status_error
            .is_consistent_with(self.transfer_status)
        {
            return Err(PayloadError::InconsistentStatus);
        }

        Ok(())
    }

    /// Carries only the id and the status pair, everything else is left empty.
    pub fn to_transfer_request(&self) -> TransferRequest {
        let mut transfer = TransferRequest::new(MerchantId(String::new()), vec![]);
        transfer.transfer_id = self.transfer_id.clone();
        transfer.set_status(self.transfer_status, self.transfer_status_error);
        transfer
    }
}

fn require_merchant(merchant_id: &MerchantId) -> Result<(), PayloadError> {
    if merchant_id.trim().is_empty() {
        return Err(PayloadError::EmptyMerchantId);
    }

    Ok(())
}

fn add_slice(slices: &mut Vec<AddressAmount>, address: &Address, amount: Decimal) {
    match slices.iter_mut().find(|s| &s.address == address) {
        Some(existing) => existing.amount.0 += amount,
        None => slices.push(AddressAmount::new(address, amount)),
    }
}
