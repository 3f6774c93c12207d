use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;
use uuid::Uuid;

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
#[serde(transparent)]
pub struct MerchantId(pub String);

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
#[serde(transparent)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn generate() -> Self {
        TransferId(Uuid::new_v4().to_string())
    }
}

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
#[serde(transparent)]
pub struct Address(pub String);

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
#[serde(transparent)]
pub struct AssetId(pub String);

#[derive(
    Shrinkwrap, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Display, Hash,
)]
#[serde(transparent)]
pub struct Amount(pub Decimal);
