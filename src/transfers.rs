use std::{collections::HashSet, sync::Arc};

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::{
    blockchain::{BlockchainTransferClient, MultipleTransferRequest, OnchainOutcome},
    domain::{
        props::{Address, TransferId},
        transfer::{
            aggregate::{TransferRequest, TransferStatus, TransferStatusError},
            error::TransferServiceError,
        },
        wallet::WalletRepository,
    },
    publisher::TransferRequestPublisher,
    store::TransferRepository,
};

pub type ServiceResult<T> = Result<T, TransferServiceError>;

// Orchestrates one transfer across wallets, storage, the blockchain service and
// the event publisher. Sub-transactions run one after another and a failure
// stops the run; those already submitted stay on chain since nothing here can
// reverse them.
pub struct TransferRequestService {
    transfers: Arc<dyn TransferRepository>,
    wallets: Arc<dyn WalletRepository>,
    blockchain: Arc<dyn BlockchainTransferClient>,
    publisher: Arc<dyn TransferRequestPublisher>,
}

impl TransferRequestService {
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        wallets: Arc<dyn WalletRepository>,
        blockchain: Arc<dyn BlockchainTransferClient>,
        publisher: Arc<dyn TransferRequestPublisher>,
    ) -> Self {
        TransferRequestService {
            transfers,
            wallets,
            blockchain,
            publisher,
        }
    }

    /// Validates source ownership, then submits every transaction in order.
    /// Expected failures come back as a transfer in `Error` status, `Err` is
    /// left for infrastructure failures.
    pub async fn create_transfer_crosswise(
        &self,
        request: &TransferRequest,
    ) -> ServiceResult<TransferRequest> {
        let mut transfer = request.working_copy();

        if let Some(error) = self.check_ownership(&transfer).await? {
            warn!(
                merchant_id = %transfer.merchant_id,
                %error,
                "Transfer rejected"
            );
            return Ok(TransferRequest::error(
                request.merchant_id.clone(),
                error,
                request.transaction_requests.clone(),
            ));
        }

        self.persist_and_publish(&transfer).await?;

        for index in 0..transfer.transaction_requests.len() {
            let tx = &transfer.transaction_requests[index];
            let submission = MultipleTransferRequest {
                transaction_id: format!("{}:{}", transfer.transfer_id, index),
                destination: tx.destination_address.clone(),
                asset: tx.asset_id.clone(),
                fee_rate: 0,
                fixed_fee: Decimal::ZERO,
                sources: tx.source_amounts.clone(),
            };

            match self.blockchain.transfer_multiple(submission).await? {
                Some(OnchainOutcome::Submitted(onchain)) if !onchain.hash.is_empty() => {
                    debug!(
                        transfer_id = %transfer.transfer_id,
                        index,
                        onchain_id = %onchain.transaction_id,
                        hash = %onchain.hash,
                        "Transaction submitted"
                    );
                    transfer.transaction_requests[index].transaction_hash = Some(onchain.hash);
                    self.persist_and_publish(&transfer).await?;
                }
                outcome => {
                    let reason = match &outcome {
                        Some(OnchainOutcome::Rejected(e)) => {
                            format!("{} ({}): {}", e.kind, e.code.unwrap_or_default(), e.message)
                        }
                        Some(OnchainOutcome::Submitted(_)) => "empty transaction hash".to_owned(),
                        None => "no response".to_owned(),
                    };
                    warn!(
                        transfer_id = %transfer.transfer_id,
                        index,
                        destination = %tx.destination_address,
                        amount = %tx.amount,
                        asset = %tx.asset_id,
                        "Transfer terminated, transaction failed: {}",
                        reason
                    );

                    let failed = TransferRequest::error(
                        transfer.merchant_id.clone(),
                        TransferStatusError::InternalError,
                        transfer.transaction_requests.clone(),
                    );
                    self.persist_and_publish(&failed).await?;
                    return Ok(failed);
                }
            }
        }

        // Every transaction is on its way. Confirmations are tracked elsewhere.
        transfer.set_status(TransferStatus::InProgress, TransferStatusError::None);
        self.persist_and_publish(&transfer).await?;

        info!(
            transfer_id = %transfer.transfer_id,
            transactions = transfer.transaction_requests.len(),
            "Transfer submitted"
        );
        Ok(transfer)
    }

    /// Copies status and status error onto the stored transfer. `None` when
    /// the transfer is unknown.
    pub async fn update_transfer_status(
        &self,
        update: &TransferRequest,
    ) -> ServiceResult<Option<TransferRequest>> {
        let Some(mut stored) = self.transfers.get(&update.transfer_id).await? else {
            debug!(transfer_id = %update.transfer_id, "Status update for unknown transfer");
            return Ok(None);
        };

        stored.set_status(update.transfer_status, update.transfer_status_error);
        let updated = self.save_or_error(stored).await?;
        self.publisher.publish(&updated).await?;

        Ok(Some(updated))
    }

    /// Overwrites the stored transfer with the given one.
    pub async fn update_transfer(
        &self,
        transfer: &TransferRequest,
    ) -> ServiceResult<TransferRequest> {
        let updated = self.save_or_error(transfer.working_copy()).await?;
        self.publisher.publish(&updated).await?;

        Ok(updated)
    }

    pub async fn get_transfer_info(
        &self,
        transfer_id: &TransferId,
    ) -> ServiceResult<Option<TransferRequest>> {
        Ok(self.transfers.get(transfer_id).await?)
    }

    pub async fn get_transfer_transaction(
        &self,
        transfer_id: &TransferId,
        transaction_hash: &str,
    ) -> ServiceResult<Option<TransferRequest>> {
        Ok(self
            .transfers
            .get_transaction(transfer_id, transaction_hash)
            .await?)
    }

    pub async fn get_all_transfers(&self) -> ServiceResult<Vec<TransferRequest>> {
        Ok(self.transfers.get_all().await?)
    }

    async fn check_ownership(
        &self,
        transfer: &TransferRequest,
    ) -> ServiceResult<Option<TransferStatusError>> {
        let error = match self.wallets.get_by_merchant(&transfer.merchant_id).await? {
            None => Some(TransferStatusError::MerchantNotFound),
            Some(wallets) if wallets.is_empty() => Some(TransferStatusError::MerchantHasNoWallets),
            Some(wallets) => {
                let owned: HashSet<&Address> = wallets.iter().map(|w| &w.address).collect();
                transfer
                    .source_addresses()
                    .any(|address| !owned.contains(address))
                    .then_some(TransferStatusError::InvalidAddress)
            }
        };

        Ok(error)
    }

    async fn persist_and_publish(&self, transfer: &TransferRequest) -> ServiceResult<()> {
        self.transfers.save(transfer).await?;
        self.publisher.publish(transfer).await?;
        Ok(())
    }

    async fn save_or_error(&self, transfer: TransferRequest) -> ServiceResult<TransferRequest> {
        if self.transfers.save(&transfer).await? > 0 {
            return Ok(transfer);
        }

        warn!(transfer_id = %transfer.transfer_id, "Nothing was stored for transfer");
        Ok(TransferRequest::error(
            transfer.merchant_id,
            TransferStatusError::InternalError,
            transfer.transaction_requests,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, VecDeque},
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use rust_decimal::dec;

    use crate::{
        blockchain::{
            BlockchainError, BlockchainTransferClient, MultipleTransferRequest, OnchainError,
            OnchainErrorKind, OnchainOutcome, OnchainTransaction,
        },
        domain::{
            props::{Address, Amount, AssetId, MerchantId, TransferId},
            transfer::{
                aggregate::{
                    AddressAmount, TransactionRequest, TransferRequest, TransferStatus,
                    TransferStatusError,
                },
                error::TransferServiceError,
            },
            wallet::{Wallet, WalletRepository},
        },
        publisher::{PublishError, TransferRequestPublisher},
        store::{StoreError, TransferRepository},
        transfers::TransferRequestService,
    };

    #[derive(Default)]
    struct RecordingRepository {
        saved: Mutex<Vec<TransferRequest>>,
        latest: Mutex<HashMap<String, TransferRequest>>,
        nothing_written: bool,
    }

    #[async_trait]
    impl TransferRepository for RecordingRepository {
        async fn get_all(&self) -> Result<Vec<TransferRequest>, StoreError> {
            Ok(self.latest.lock().unwrap().values().cloned().collect())
        }

        async fn get(&self, transfer_id: &TransferId) -> Result<Option<TransferRequest>, StoreError> {
            Ok(self.latest.lock().unwrap().get(&transfer_id.0).cloned())
        }

        async fn get_transaction(
            &self,
            _transfer_id: &TransferId,
            _transaction_hash: &str,
        ) -> Result<Option<TransferRequest>, StoreError> {
            Ok(None)
        }

        async fn save(&self, transfer: &TransferRequest) -> Result<usize, StoreError> {
            self.saved.lock().unwrap().push(transfer.clone());
            if self.nothing_written {
                return Ok(0);
            }
            self.latest
                .lock()
                .unwrap()
                .insert(transfer.transfer_id.0.clone(), transfer.clone());
            Ok(transfer.transaction_requests.len())
        }
    }

    struct FakeWallets(Option<Vec<&'static str>>);

    #[async_trait]
    impl WalletRepository for FakeWallets {
        async fn get_by_merchant(
            &self,
            _merchant_id: &MerchantId,
        ) -> Result<Option<Vec<Wallet>>, StoreError> {
            Ok(self.0.as_ref().map(|addresses| {
                addresses
                    .iter()
                    .map(|a| Wallet {
                        address: Address((*a).to_owned()),
                        amount: Amount(dec!(10)),
                    })
                    .collect()
            }))
        }
    }

    #[derive(Default)]
    struct ScriptedBlockchain {
        outcomes: Mutex<VecDeque<Result<Option<OnchainOutcome>, BlockchainError>>>,
        requests: Mutex<Vec<MultipleTransferRequest>>,
    }

    impl ScriptedBlockchain {
        fn new(outcomes: Vec<Result<Option<OnchainOutcome>, BlockchainError>>) -> Self {
            ScriptedBlockchain {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl BlockchainTransferClient for ScriptedBlockchain {
        async fn transfer_multiple(
            &self,
            request: MultipleTransferRequest,
        ) -> Result<Option<OnchainOutcome>, BlockchainError> {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("Unexpected blockchain call")
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<TransferRequest>>,
    }

    #[async_trait]
    impl TransferRequestPublisher for RecordingPublisher {
        async fn publish(&self, transfer: &TransferRequest) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(transfer.clone());
            Ok(())
        }
    }

    struct Fixture {
        repository: Arc<RecordingRepository>,
        blockchain: Arc<ScriptedBlockchain>,
        publisher: Arc<RecordingPublisher>,
        service: TransferRequestService,
    }

    fn fixture(
        wallets: Option<Vec<&'static str>>,
        outcomes: Vec<Result<Option<OnchainOutcome>, BlockchainError>>,
        repository: RecordingRepository,
    ) -> Fixture {
        let repository = Arc::new(repository);
        let blockchain = Arc::new(ScriptedBlockchain::new(outcomes));
        let publisher = Arc::new(RecordingPublisher::default());
        let service = TransferRequestService::new(
            repository.clone(),
            Arc::new(FakeWallets(wallets)),
            blockchain.clone(),
            publisher.clone(),
        );

        Fixture {
            repository,
            blockchain,
            publisher,
            service,
        }
    }

    fn submitted(hash: &str) -> Result<Option<OnchainOutcome>, BlockchainError> {
        Ok(Some(OnchainOutcome::Submitted(OnchainTransaction {
            transaction_id: format!("bc-{}", hash),
            hash: hash.to_owned(),
        })))
    }

    fn rejected() -> Result<Option<OnchainOutcome>, BlockchainError> {
        Ok(Some(OnchainOutcome::Rejected(OnchainError {
            code: Some(1),
            message: "not enough funds".to_owned(),
            kind: OnchainErrorKind::NotEnoughFunds,
        })))
    }

    fn transfer() -> TransferRequest {
        TransferRequest::new(
            MerchantId("m-1".to_owned()),
            vec![
                TransactionRequest::from_sources(
                    vec![
                        AddressAmount::new("src-1", dec!(0.5)),
                        AddressAmount::new("src-2", dec!(0.25)),
                    ],
                    Address("dst-1".to_owned()),
                    AssetId("BTC".to_owned()),
                    1,
                )
                .unwrap(),
                TransactionRequest::from_sources(
                    vec![AddressAmount::new("src-2", dec!(1))],
                    Address("dst-2".to_owned()),
                    AssetId("BTC".to_owned()),
                    1,
                )
                .unwrap(),
            ],
        )
    }

    fn owned_wallets() -> Option<Vec<&'static str>> {
        Some(vec!["src-1", "src-2", "src-3"])
    }

    #[tokio::test]
    async fn test_unknown_merchant() {
        let f = fixture(None, vec![], RecordingRepository::default());
        let request = transfer();

        let result = f.service.create_transfer_crosswise(&request).await.unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::MerchantNotFound);
        assert_ne!(result.transfer_id, request.transfer_id);
        assert_eq!(result.transaction_requests, request.transaction_requests);
        assert!(f.repository.saved.lock().unwrap().is_empty());
        assert!(f.publisher.published.lock().unwrap().is_empty());
        assert!(f.blockchain.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merchant_without_wallets() {
        let f = fixture(Some(vec![]), vec![], RecordingRepository::default());

        let result = f.service.create_transfer_crosswise(&transfer()).await.unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(
            result.transfer_status_error,
            TransferStatusError::MerchantHasNoWallets
        );
        assert!(f.repository.saved.lock().unwrap().is_empty());
        assert!(f.publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_source_address() {
        let f = fixture(Some(vec!["src-1"]), vec![], RecordingRepository::default());

        let result = f.service.create_transfer_crosswise(&transfer()).await.unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::InvalidAddress);
        assert!(f.repository.saved.lock().unwrap().is_empty());
        assert!(f.publisher.published.lock().unwrap().is_empty());
        assert!(f.blockchain.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_transactions_submitted() {
        let f = fixture(
            owned_wallets(),
            vec![submitted("hash-1"), submitted("hash-2")],
            RecordingRepository::default(),
        );
        let request = transfer();

        let result = f.service.create_transfer_crosswise(&request).await.unwrap();

        assert_eq!(result.transfer_id, request.transfer_id);
        assert_eq!(result.transfer_status, TransferStatus::InProgress);
        assert_eq!(result.transfer_status_error, TransferStatusError::None);
        let hashes: Vec<_> = result
            .transaction_requests
            .iter()
            .map(|t| t.transaction_hash.as_deref())
            .collect();
        assert_eq!(hashes, vec![Some("hash-1"), Some("hash-2")]);

        // initial, one per transaction, final
        let saved = f.repository.saved.lock().unwrap().clone();
        let published = f.publisher.published.lock().unwrap().clone();
        assert_eq!(saved.len(), 4);
        assert_eq!(saved, published);
        assert!(saved[0].transaction_requests.iter().all(|t| t.transaction_hash.is_none()));
        assert_eq!(
            saved[1].transaction_requests[0].transaction_hash.as_deref(),
            Some("hash-1")
        );
        assert_eq!(saved[1].transaction_requests[1].transaction_hash, None);
        assert_eq!(saved[3], result);

        let requests = f.blockchain.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].transaction_id, format!("{}:0", request.transfer_id));
        assert_eq!(requests[0].destination, Address("dst-1".to_owned()));
        assert_eq!(requests[0].sources, request.transaction_requests[0].source_amounts);
        assert_eq!(requests[0].fee_rate, 0);
        assert_eq!(requests[0].fixed_fee, dec!(0));
        assert_eq!(requests[1].transaction_id, format!("{}:1", request.transfer_id));
    }

    #[tokio::test]
    async fn test_failure_stops_the_transfer() {
        let f = fixture(
            owned_wallets(),
            vec![submitted("hash-1"), rejected(), submitted("never")],
            RecordingRepository::default(),
        );
        let request = transfer();

        let result = f.service.create_transfer_crosswise(&request).await.unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::InternalError);
        assert_ne!(result.transfer_id, request.transfer_id);
        assert_eq!(
            result.transaction_requests[0].transaction_hash.as_deref(),
            Some("hash-1")
        );
        assert_eq!(result.transaction_requests[1].transaction_hash, None);
        assert_eq!(f.blockchain.requests.lock().unwrap().len(), 2);

        let original = f
            .repository
            .get(&request.transfer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            original.transaction_requests[0].transaction_hash.as_deref(),
            Some("hash-1")
        );
        assert_eq!(f.repository.get(&result.transfer_id).await.unwrap(), Some(result.clone()));
        assert_eq!(f.publisher.published.lock().unwrap().last(), Some(&result));
    }

    #[tokio::test]
    async fn test_missing_response_and_empty_hash_fail() {
        for outcome in [
            Ok(None),
            Ok(Some(OnchainOutcome::Submitted(OnchainTransaction {
                transaction_id: "bc".to_owned(),
                hash: String::new(),
            }))),
        ] {
            let f = fixture(owned_wallets(), vec![outcome], RecordingRepository::default());

            let result = f.service.create_transfer_crosswise(&transfer()).await.unwrap();

            assert_eq!(result.transfer_status, TransferStatus::Error);
            assert_eq!(result.transfer_status_error, TransferStatusError::InternalError);
            assert_eq!(f.blockchain.requests.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let f = fixture(
            owned_wallets(),
            vec![Err(BlockchainError::Transport("refused".to_owned()))],
            RecordingRepository::default(),
        );

        let result = f.service.create_transfer_crosswise(&transfer()).await;

        assert!(matches!(result, Err(TransferServiceError::Blockchain(_))));
    }

    #[tokio::test]
    async fn test_input_is_left_untouched() {
        let f = fixture(
            owned_wallets(),
            vec![submitted("hash-1"), submitted("hash-2")],
            RecordingRepository::default(),
        );
        let request = transfer();
        let before = request.clone();

        f.service.create_transfer_crosswise(&request).await.unwrap();

        assert_eq!(request, before);
    }

    #[tokio::test]
    async fn test_update_status_of_unknown_transfer() {
        let f = fixture(owned_wallets(), vec![], RecordingRepository::default());

        let result = f.service.update_transfer_status(&transfer()).await.unwrap();

        assert_eq!(result, None);
        assert!(f.publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_status_keeps_stored_fields() {
        let f = fixture(owned_wallets(), vec![], RecordingRepository::default());
        let stored = transfer();
        f.repository.save(&stored).await.unwrap();

        let mut update = TransferRequest::new(MerchantId("other".to_owned()), vec![]);
        update.transfer_id = stored.transfer_id.clone();
        update.set_status(TransferStatus::Error, TransferStatusError::NotConfirmed);

        let result = f
            .service
            .update_transfer_status(&update)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.transfer_id, stored.transfer_id);
        assert_eq!(result.merchant_id, stored.merchant_id);
        assert_eq!(result.create_date, stored.create_date);
        assert_eq!(result.transaction_requests, stored.transaction_requests);
        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::NotConfirmed);
        assert_eq!(f.publisher.published.lock().unwrap().clone(), vec![result]);
    }

    #[tokio::test]
    async fn test_update_without_stored_rows_reports_error() {
        let f = fixture(
            owned_wallets(),
            vec![],
            RecordingRepository {
                nothing_written: true,
                ..Default::default()
            },
        );
        let mut stored = transfer();
        stored.set_status(TransferStatus::Completed, TransferStatusError::None);

        let result = f.service.update_transfer(&stored).await.unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::InternalError);
        assert_ne!(result.transfer_id, stored.transfer_id);
        assert_eq!(f.publisher.published.lock().unwrap().clone(), vec![result]);
    }

    #[tokio::test]
    async fn test_status_update_without_stored_rows_reports_error() {
        let stored = transfer();
        let f = fixture(
            owned_wallets(),
            vec![],
            RecordingRepository {
                latest: Mutex::new(HashMap::from([(
                    stored.transfer_id.0.clone(),
                    stored.clone(),
                )])),
                nothing_written: true,
                ..Default::default()
            },
        );

        let mut update = TransferRequest::new(MerchantId("m-1".to_owned()), vec![]);
        update.transfer_id = stored.transfer_id.clone();
        update.set_status(TransferStatus::Completed, TransferStatusError::None);

        let result = f
            .service
            .update_transfer_status(&update)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.transfer_status, TransferStatus::Error);
        assert_eq!(result.transfer_status_error, TransferStatusError::InternalError);
        assert_ne!(result.transfer_id, stored.transfer_id);
        assert_eq!(f.repository.saved.lock().unwrap().len(), 1);
        assert_eq!(f.publisher.published.lock().unwrap().clone(), vec![result]);
    }

    #[tokio::test]
    async fn test_update_transfer_overwrites() {
        let f = fixture(owned_wallets(), vec![], RecordingRepository::default());
        let mut stored = transfer();
        f.repository.save(&stored).await.unwrap();

        stored.transaction_requests[0].transaction_hash = Some("fixed".to_owned());
        let result = f.service.update_transfer(&stored).await.unwrap();

        assert_eq!(result, stored);
        assert_eq!(
            f.service.get_transfer_info(&stored.transfer_id).await.unwrap(),
            Some(stored)
        );
    }
}
