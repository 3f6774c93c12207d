use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::{
    Row, Sqlite, SqlitePool,
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
};

use crate::{
    domain::{
        props::Amount,
        transfer::aggregate::{TransferStatus, TransferStatusError},
    },
    store::{StoreError, TransferRecord, TransferStore},
};

const SELECT_RECORDS: &str = "SELECT transfer_id, row_key, position, merchant_id, transfer_status,
        transfer_status_error, created_date, transaction_hash, source_amounts,
        destination_address, amount, asset_id, count_confirm
    FROM transfer_transactions";

pub async fn init_transfers_table(sqlite_pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transfer_transactions
            (
                transfer_id           text    NOT NULL,
                row_key               text    NOT NULL,
                position              integer NOT NULL,
                merchant_id           text    NOT NULL,
                transfer_status       text    NOT NULL,
                transfer_status_error text    NOT NULL,
                created_date          text    NOT NULL,
                transaction_hash      text,
                source_amounts        json    NOT NULL,
                destination_address   text    NOT NULL,
                amount                text    NOT NULL,
                asset_id              text    NOT NULL,
                count_confirm         integer NOT NULL,
                PRIMARY KEY (transfer_id, row_key)
            );",
    )
    .execute(sqlite_pool)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct SqliteTransferStore {
    pool: SqlitePool,
}

impl SqliteTransferStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTransferStore { pool }
    }
}

fn corrupted(e: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupted(e.to_string())
}

fn record_from_row(row: &SqliteRow) -> Result<TransferRecord, StoreError> {
    let position: i64 = row.try_get("position")?;
    let status: String = row.try_get("transfer_status")?;
    let status_error: String = row.try_get("transfer_status_error")?;
    let created_date: String = row.try_get("created_date")?;
    let source_amounts: String = row.try_get("source_amounts")?;
    let amount: String = row.try_get("amount")?;
    let count_confirm: i64 = row.try_get("count_confirm")?;

    Ok(TransferRecord {
        transfer_id: row.try_get("transfer_id")?,
        row_key: row.try_get("row_key")?,
        position: u32::try_from(position).map_err(corrupted)?,
        merchant_id: row.try_get("merchant_id")?,
        transfer_status: TransferStatus::try_from(status.as_str()).map_err(corrupted)?,
        transfer_status_error: TransferStatusError::try_from(status_error.as_str())
            .map_err(corrupted)?,
        created_date: DateTime::parse_from_rfc3339(&created_date)
            .map_err(corrupted)?
            .with_timezone(&Utc),
        transaction_hash: row.try_get("transaction_hash")?,
        source_amounts: serde_json::from_str(&source_amounts)?,
        destination_address: row.try_get("destination_address")?,
        amount: Amount(Decimal::from_str(&amount).map_err(corrupted)?),
        asset_id: row.try_get("asset_id")?,
        count_confirm: u32::try_from(count_confirm).map_err(corrupted)?,
    })
}

impl SqliteTransferStore {
    async fn fetch_records<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Result<Vec<TransferRecord>, StoreError> {
        let mut rows = query.fetch(&self.pool);
        let mut records = vec![];
        while let Some(row) = rows.try_next().await? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl TransferStore for SqliteTransferStore {
    async fn get_all(&self) -> Result<Vec<TransferRecord>, StoreError> {
        self.fetch_records(sqlx::query(SELECT_RECORDS)).await
    }

    async fn get_partition(&self, transfer_id: &str) -> Result<Vec<TransferRecord>, StoreError> {
        let sql = format!("{} WHERE transfer_id = ?", SELECT_RECORDS);
        self.fetch_records(sqlx::query(&sql).bind(transfer_id)).await
    }

    async fn get(
        &self,
        transfer_id: &str,
        row_key: &str,
    ) -> Result<Option<TransferRecord>, StoreError> {
        let sql = format!("{} WHERE transfer_id = ? AND row_key = ?", SELECT_RECORDS);
        let row = sqlx::query(&sql)
            .bind(transfer_id)
            .bind(row_key)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &TransferRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO transfer_transactions
                (transfer_id, row_key, position, merchant_id, transfer_status,
                 transfer_status_error, created_date, transaction_hash, source_amounts,
                 destination_address, amount, asset_id, count_confirm)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (transfer_id, row_key) DO UPDATE SET
                position = excluded.position,
                merchant_id = excluded.merchant_id,
                transfer_status = excluded.transfer_status,
                transfer_status_error = excluded.transfer_status_error,
                created_date = excluded.created_date,
                transaction_hash = excluded.transaction_hash,
                source_amounts = excluded.source_amounts,
                destination_address = excluded.destination_address,
                amount = excluded.amount,
                asset_id = excluded.asset_id,
                count_confirm = excluded.count_confirm",
        )
        .bind(&record.transfer_id)
        .bind(&record.row_key)
        .bind(i64::from(record.position))
        .bind(&record.merchant_id)
        .bind(record.transfer_status.as_str())
        .bind(record.transfer_status_error.as_str())
        .bind(
            record
                .created_date
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
        )
        .bind(record.transaction_hash.as_deref())
        .bind(serde_json::to_string(&record.source_amounts)?)
        .bind(&record.destination_address)
        .bind(record.amount.to_string())
        .bind(&record.asset_id)
        .bind(i64::from(record.count_confirm))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, transfer_id: &str, row_key: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM transfer_transactions WHERE transfer_id = ? AND row_key = ?")
                .bind(transfer_id)
                .bind(row_key)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
