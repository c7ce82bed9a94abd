use std::sync::Arc;

use axum::{body::Bytes, extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::{error::LedgerError, handlers::{parse_account_id, AppState}};

#[derive(Deserialize)]
struct TransactionDTO {
    pub value: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Serialize)]
struct TransactionResultDTO {
    pub limit: i64,
    pub balance: i64,
}

pub async fn handler(
    Path(id): Path<String>,
    State(app_state): State<Arc<AppState>>,
    payload: Bytes,
) -> Result<impl IntoResponse, LedgerError> {

    let account_id = parse_account_id(&id)?;
    app_state.ledger.check_account(account_id)?;

    let payload = serde_json::from_slice::<TransactionDTO>(&payload)
        .map_err(|e| LedgerError::invalid(format!("malformed body: {e}")))?;

    let updated = app_state.ledger
        .apply_transaction(account_id, payload.value, &payload.kind, &payload.description, app_state.deadline())
        .await?;

    Ok((StatusCode::OK, Json(TransactionResultDTO {
        limit: updated.limit,
        balance: updated.balance,
    })))
}
