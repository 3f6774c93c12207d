use async_trait::async_trait;
use derive_more::Display;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::transfer::{aggregate::TransferRequest, event::TransferRequestMessage};

#[derive(Debug, Display)]
pub enum PublishError {
    #[display("No subscriber is listening for transfer events")]
    NoSubscribers,
}

impl std::error::Error for PublishError {}

#[async_trait]
pub trait TransferRequestPublisher: Send + Sync {
    async fn publish(&self, transfer: &TransferRequest) -> Result<(), PublishError>;
}

/// In-process fan-out of transfer events.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<TransferRequestMessage>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        BroadcastPublisher { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferRequestMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl TransferRequestPublisher for BroadcastPublisher {
    async fn publish(&self, transfer: &TransferRequest) -> Result<(), PublishError> {
        let message = TransferRequestMessage::from(transfer);
        debug!(
            transfer_id = %message.transfer_id,
            status = %message.transfer_status,
            "Publishing transfer request message"
        );

        self.sender
            .send(message)
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}

/// Writes every event to the log until the publisher goes away.
pub async fn log_events(mut receiver: broadcast::Receiver<TransferRequestMessage>) {
    loop {
        match receiver.recv().await {
            Ok(message) => match serde_json::to_string(&message) {
                Ok(json) => info!(target: "transfer_events", "{}", json),
                Err(e) => warn!("Could not serialize transfer event: {}", e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Transfer event log fell behind")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
