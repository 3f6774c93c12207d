#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

use std::{str::FromStr, sync::Arc};

use color_eyre::eyre::{Result, eyre};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    api::AppState,
    blockchain::HttpBlockchainClient,
    config::AppConfig,
    domain::props::AssetId,
    publisher::BroadcastPublisher,
    store::{
        KeyedTransferRepository, SqliteTransferStore, SqliteWalletRepository,
        init_transfers_table, init_wallet_tables,
    },
    transfers::TransferRequestService,
};

mod api;
mod blockchain;
mod config;
mod csv;
mod domain;
mod logging;
mod publisher;
mod store;
mod transfers;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = AppConfig::load()?;
    logging::init_logging(&config);

    let sqlite_pool = sqlite_pool(&config.database_url).await?;
    init_transfers_table(&sqlite_pool).await?;
    init_wallet_tables(&sqlite_pool).await?;

    let wallets = SqliteWalletRepository::new(sqlite_pool.clone());
    if let Some(path) = &config.merchant_wallets_csv {
        wallets.seed_from_csv(path).await?;
    }

    // Events go to the log until a real bus is attached.
    let event_publisher = BroadcastPublisher::new(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(publisher::log_events(event_publisher.subscribe()));

    let blockchain =
        HttpBlockchainClient::new(&config.blockchain_api_url, config.blockchain_api_timeout)?;
    let transfers = KeyedTransferRepository::new(Arc::new(SqliteTransferStore::new(sqlite_pool)));

    let service = TransferRequestService::new(
        Arc::new(transfers),
        Arc::new(wallets),
        Arc::new(blockchain),
        Arc::new(event_publisher),
    );
    let app = api::router(AppState {
        service: Arc::new(service),
        asset_id: AssetId(config.asset_id.clone()),
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| eyre!("Could not listen on {}: {}", config.listen_addr, e))?;
    info!(addr = %config.listen_addr, "Transfer service listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn sqlite_pool(sqlite_uri: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(sqlite_uri)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
    SqlitePool::connect_with(opts).await.map_err(|e| eyre!(e))
}
