use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::blockchain::{
    BlockchainError, BlockchainTransferClient, MultipleTransferRequest, OnchainError,
    OnchainOutcome, OnchainTransaction,
};

const MULTIPLE_TRANSFER_PATH: &str = "/api/transaction/multipletransfer";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnchainResponse {
    #[serde(default)]
    transaction: Option<OnchainTransaction>,
    #[serde(default)]
    error: Option<OnchainError>,
}

impl OnchainResponse {
    fn into_outcome(self) -> Option<OnchainOutcome> {
        match (self.error, self.transaction) {
            (Some(error), _) => Some(OnchainOutcome::Rejected(error)),
            (None, Some(transaction)) => Some(OnchainOutcome::Submitted(transaction)),
            (None, None) => None,
        }
    }
}

/// Talks to the blockchain API over HTTP.
#[derive(Clone)]
pub struct HttpBlockchainClient {
    client: Client,
    base_url: String,
}

impl HttpBlockchainClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BlockchainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlockchainError::Setup(e.to_string()))?;

        Ok(HttpBlockchainClient {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl BlockchainTransferClient for HttpBlockchainClient {
    async fn transfer_multiple(
        &self,
        request: MultipleTransferRequest,
    ) -> Result<Option<OnchainOutcome>, BlockchainError> {
        let url = format!("{}{}", self.base_url, MULTIPLE_TRANSFER_PATH);
        debug!(
            idempotency_key = %request.transaction_id,
            destination = %request.destination,
            "Submitting multiple transfer"
        );

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(idempotency_key = %request.transaction_id, "Blockchain API timed out");
                return Ok(None);
            }
            Err(e) => return Err(BlockchainError::Transport(e.to_string())),
        };

        let status = response.status();
        match response.json::<OnchainResponse>().await {
            Ok(body) => Ok(body.into_outcome()),
            Err(e) => {
                warn!(
                    idempotency_key = %request.transaction_id,
                    %status,
                    "Unusable blockchain API response: {}",
                    e
                );
                Ok(None)
            }
        }
    }
}
