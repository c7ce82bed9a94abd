use std::sync::Arc;

use axum::{extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::LedgerError, handlers::{parse_account_id, AppState}, ledger::Statement};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementDTO {
    pub balance: StatementBalanceDTO,
    pub last_transactions: Vec<StatementTransactionDTO>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementBalanceDTO {
    pub total: i64,
    pub limit: i64,
    pub statement_date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTransactionDTO {
    pub value: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: String,
    pub created_at: String,
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

impl From<Statement> for StatementDTO {
    fn from(statement: Statement) -> StatementDTO {
        StatementDTO {
            balance: StatementBalanceDTO {
                total: statement.balance.balance,
                limit: statement.balance.limit,
                statement_date: format_timestamp(statement.as_of),
            },
            last_transactions: statement.transactions.into_iter().map(|t| StatementTransactionDTO {
                value: t.amount,
                kind: t.kind.code(),
                description: t.description,
                created_at: format_timestamp(t.created_at),
            }).collect()
        }
    }
}

pub async fn handler(
    Path(id): Path<String>,
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, LedgerError> {

    let account_id = parse_account_id(&id)?;
    let statement = app_state.ledger.statement(account_id, app_state.deadline()).await?;

    Ok((StatusCode::OK, Json(StatementDTO::from(statement))))
}
