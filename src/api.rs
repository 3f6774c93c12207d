use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use derive_more::Display;
use serde::Serialize;
use tracing::error;

use crate::{
    domain::{
        props::{AssetId, TransferId},
        transfer::{
            aggregate::{TransferRequest, TransferStatus},
            command::{
                TransferCrosswisePayload, TransferMultiBijectivePayload,
                UpdateTransferStatusPayload,
            },
            error::{PayloadError, TransferServiceError},
        },
    },
    transfers::TransferRequestService,
};

const TERMINATED_MESSAGE: &str = "Execution of the transfer was terminated for some reasons. \
    Please, note, that some of its transactions may have passed with success. \
    The transfer data is attached: ";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TransferRequestService>,
    /// Asset every mapped transaction is issued in.
    pub asset_id: AssetId,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/merchants/transferCrosswise", post(transfer_crosswise))
        .route(
            "/api/merchants/transferMultiBijective",
            post(transfer_multi_bijective),
        )
        .route("/api/transfers", get(list_transfers))
        .route("/api/transfers/updateStatus", post(update_status))
        .route("/api/transfers/update", post(update_transfer))
        .route("/api/transfers/{transfer_id}/getStatus", get(get_status))
        .route(
            "/api/transfers/{transfer_id}/transactions/{transaction_hash}",
            get(get_transaction),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_message: String,
}

#[derive(Debug, Display)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(TransferServiceError),
}

impl From<PayloadError> for ApiError {
    fn from(e: PayloadError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<TransferServiceError> for ApiError {
    fn from(e: TransferServiceError) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(e) => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_owned(),
                )
            }
        };

        (status, Json(ErrorResponse { error_message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn transfer_crosswise(
    State(state): State<AppState>,
    payload: Result<Json<TransferCrosswisePayload>, JsonRejection>,
) -> ApiResult<TransferRequest> {
    let Json(payload) = payload?;
    payload.validate()?;
    let transfer = payload
        .to_transfer_request(&state.asset_id)
        .ok_or(PayloadError::Malformed)?;

    execute(&state, transfer).await
}

async fn transfer_multi_bijective(
    State(state): State<AppState>,
    payload: Result<Json<TransferMultiBijectivePayload>, JsonRejection>,
) -> ApiResult<TransferRequest> {
    let Json(payload) = payload?;
    payload.validate()?;
    let transfer = payload
        .to_transfer_request(&state.asset_id)
        .ok_or(PayloadError::Malformed)?;

    execute(&state, transfer).await
}

async fn execute(state: &AppState, transfer: TransferRequest) -> ApiResult<TransferRequest> {
    let result = state.service.create_transfer_crosswise(&transfer).await?;
    if result.transfer_status == TransferStatus::Error {
        let attached = serde_json::to_string(&result).unwrap_or_default();
        return Err(ApiError::BadRequest(format!(
            "{}{}",
            TERMINATED_MESSAGE, attached
        )));
    }

    Ok(Json(result))
}

async fn update_status(
    State(state): State<AppState>,
    payload: Result<Json<UpdateTransferStatusPayload>, JsonRejection>,
) -> ApiResult<TransferRequest> {
    let Json(payload) = payload?;
    payload.validate()?;

    state
        .service
        .update_transfer_status(&payload.to_transfer_request())
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&payload.transfer_id))
}

async fn update_transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferRequest> {
    let Json(transfer) = payload?;
    if transfer.transfer_id.trim().is_empty() {
        return Err(PayloadError::EmptyTransferId.into());
    }

    if !transfer.has_consistent_status() {
        return Err(PayloadError::InconsistentStatus.into());
    }

    Ok(Json(state.service.update_transfer(&transfer).await?))
}

async fn get_status(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> ApiResult<TransferRequest> {
    let transfer_id = TransferId(transfer_id);

    state
        .service
        .get_transfer_info(&transfer_id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&transfer_id))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path((transfer_id, transaction_hash)): Path<(String, String)>,
) -> ApiResult<TransferRequest> {
    let transfer_id = TransferId(transfer_id);

    state
        .service
        .get_transfer_transaction(&transfer_id, &transaction_hash)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Transaction {} of transfer {} not found",
                transaction_hash, transfer_id
            ))
        })
}

async fn list_transfers(State(state): State<AppState>) -> ApiResult<Vec<TransferRequest>> {
    Ok(Json(state.service.get_all_transfers().await?))
}

fn not_found(transfer_id: &TransferId) -> ApiError {
    ApiError::NotFound(format!("Transfer {} not found", transfer_id))
}
