use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::props::{Address, Amount, MerchantId},
    store::StoreError,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: Address,
    pub amount: Amount,
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// `None` when the merchant is not known at all, an empty list when it
    /// is known but owns no wallets.
    async fn get_by_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Option<Vec<Wallet>>, StoreError>;
}
