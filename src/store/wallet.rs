use std::str::FromStr;

use async_trait::async_trait;
use color_eyre::eyre::{Result, eyre};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::{
    csv::{self, CsvWalletRecord},
    domain::{
        props::{Address, Amount, MerchantId},
        wallet::{Wallet, WalletRepository},
    },
    store::StoreError,
};

pub async fn init_wallet_tables(sqlite_pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS merchants
            (
                merchant_id text NOT NULL,
                PRIMARY KEY (merchant_id)
            );",
    )
    .execute(sqlite_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS merchant_wallets
            (
                merchant_id text NOT NULL,
                address     text NOT NULL,
                amount      text NOT NULL,
                PRIMARY KEY (merchant_id, address)
            );",
    )
    .execute(sqlite_pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteWalletRepository { pool }
    }

    pub async fn add_merchant(&self, merchant_id: &MerchantId) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO merchants (merchant_id) VALUES (?)")
            .bind(merchant_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_wallet(
        &self,
        merchant_id: &MerchantId,
        wallet: &Wallet,
    ) -> Result<(), StoreError> {
        self.add_merchant(merchant_id).await?;
        sqlx::query(
            "INSERT INTO merchant_wallets (merchant_id, address, amount) VALUES (?, ?, ?)
             ON CONFLICT (merchant_id, address) DO UPDATE SET amount = excluded.amount",
        )
        .bind(merchant_id.as_str())
        .bind(wallet.address.as_str())
        .bind(wallet.amount.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Loads merchants and their wallets from a CSV file. Rows that fail to
    /// parse are skipped.
    pub async fn seed_from_csv(&self, file_path: &str) -> Result<usize> {
        let rows = csv::read_input::<CsvWalletRecord>(file_path)?;

        let mut seeded = 0;
        for row_result in rows {
            match row_result {
                Ok(row) => {
                    self.seed_row(row).await.map_err(|e| eyre!(e))?;
                    seeded += 1;
                }
                Err(e) => debug!("Error parsing row: {}", e),
            }
        }

        info!(seeded, file_path, "Seeded merchant wallets");
        Ok(seeded)
    }

    async fn seed_row(&self, row: CsvWalletRecord) -> Result<(), StoreError> {
        let merchant_id = MerchantId(row.merchant_id);
        match row.address.filter(|a| !a.is_empty()) {
            Some(address) => {
                let wallet = Wallet {
                    address: Address(address),
                    amount: Amount(row.amount.unwrap_or_default()),
                };
                self.add_wallet(&merchant_id, &wallet).await
            }
            None => self.add_merchant(&merchant_id).await,
        }
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn get_by_merchant(
        &self,
        merchant_id: &MerchantId,
    ) -> Result<Option<Vec<Wallet>>, StoreError> {
        let known = sqlx::query("SELECT 1 FROM merchants WHERE merchant_id = ?")
            .bind(merchant_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        if known.is_none() {
            return Ok(None);
        }

        let mut rows = sqlx::query(
            "SELECT address, amount FROM merchant_wallets WHERE merchant_id = ? ORDER BY address",
        )
        .bind(merchant_id.as_str())
        .fetch(&self.pool);

        let mut wallets = vec![];
        while let Some(row) = rows.try_next().await? {
            let amount: String = row.try_get("amount")?;
            wallets.push(Wallet {
                address: Address(row.try_get("address")?),
                amount: Amount(
                    Decimal::from_str(&amount)
                        .map_err(|e| StoreError::Corrupted(e.to_string()))?,
                ),
            });
        }

        Ok(Some(wallets))
    }
}
