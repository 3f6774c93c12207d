use color_eyre::eyre::{Result, eyre};
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `merchant, address, amount`. A row with no address only registers the
/// merchant.
#[derive(Debug, Serialize, Deserialize)]
pub struct CsvWalletRecord {
    #[serde(rename = "merchant")]
    pub merchant_id: String,
    pub address: Option<String>,
    pub amount: Option<Decimal>,
}

pub fn read_input<D: serde::de::DeserializeOwned>(
    file_path: &str,
) -> Result<impl Iterator<Item = Result<D>>> {
    let reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(file_path)
        .map_err(|e| eyre!("Could not read wallets file: {}", e))?;

    Ok(reader
        .into_deserialize()
        .map(|r| r.map_err(|ee| eyre!("Error parsing row: {}", ee))))
}
