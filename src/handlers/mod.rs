use std::{sync::Arc, time::Duration};

use axum::{routing::{get, post}, Router};
use tokio::time::Instant;

use crate::{error::{LedgerError, LedgerResult}, ledger::Ledger};

pub mod statement;
pub mod transactions;

pub struct AppState {
    pub ledger: Ledger,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }
}

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/clients/{id}/transactions", post(transactions::handler))
        .route("/clients/{id}/statement", get(statement::handler))
        .with_state(app_state)
}

/// Non-numeric ids are invalid input; numeric ids too wide for an account id
/// cannot be provisioned and are not found.
fn parse_account_id(id: &str) -> LedgerResult<i32> {
    let id = id.parse::<i64>()
        .map_err(|_| LedgerError::invalid(format!("invalid account id {id:?}")))?;
    i32::try_from(id).map_err(|_| LedgerError::NotFound(id))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::{Request, StatusCode}};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{schema::SEED_ACCOUNTS, store::memory::MemStore};

    fn app() -> Router {
        let mut accounts = SEED_ACCOUNTS.to_vec();
        accounts[0].1 = 1000;
        let ledger = Ledger::new(Arc::new(MemStore::with_accounts(&accounts)), 5);
        router(Arc::new(AppState {
            ledger,
            request_timeout: Duration::from_secs(5),
        }))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
        (status, body)
    }

    async fn post_raw(app: &Router, id: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(format!("/clients/{id}/transactions"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    async fn post(app: &Router, id: i32, body: Value) -> (StatusCode, Value) {
        post_raw(app, &id.to_string(), &body.to_string()).await
    }

    async fn statement(app: &Router, id: &str) -> (StatusCode, Value) {
        let request = Request::get(format!("/clients/{id}/statement")).body(Body::empty()).unwrap();
        send(app, request).await
    }

    #[tokio::test]
    async fn debit_credit_and_statement_scenario() {
        let app = app();

        let (status, body) = post(&app, 1, json!({"value": 500, "type": "d", "description": "desc1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"limit": 1000, "balance": -500}));

        let (status, _) = post(&app, 1, json!({"value": 600, "type": "d", "description": "desc2"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = post(&app, 1, json!({"value": 100, "type": "c", "description": "desc3"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"limit": 1000, "balance": -400}));

        let (status, body) = statement(&app, "1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"]["total"], -400);
        assert_eq!(body["balance"]["limit"], 1000);
        assert!(body["balance"]["statementDate"].as_str().unwrap().ends_with('Z'));

        let last = body["lastTransactions"].as_array().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0]["description"], "desc3");
        assert_eq!(last[0]["type"], "c");
        assert_eq!(last[0]["value"], 100);
        assert_eq!(last[1]["description"], "desc1");
        assert_eq!(last[1]["type"], "d");
        assert!(last[1]["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn rejects_description_out_of_bounds_without_recording() {
        let app = app();

        for description in ["", "01234567890"] {
            let (status, _) = post(&app, 2, json!({"value": 10, "type": "c", "description": description})).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }

        let (_, body) = statement(&app, "2").await;
        assert_eq!(body["balance"]["total"], 0);
        assert_eq!(body["lastTransactions"], json!([]));
    }

    #[tokio::test]
    async fn malformed_bodies_are_unprocessable() {
        let app = app();
        let bodies = [
            r#"{"value": 1.5, "type": "c", "description": "frac"}"#,
            r#"{"value": 10, "type": "x", "description": "kind"}"#,
            r#"{"value": 10, "type": "c", "description": null}"#,
            r#"{"value": 10, "type": "c"}"#,
            r#"{"value": "10", "type": "c", "description": "str"}"#,
            r#"{"value": 0, "type": "c", "description": "zero"}"#,
            "not json",
        ];
        for body in bodies {
            let (status, _) = post_raw(&app, "1", body).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");
        }
    }

    #[tokio::test]
    async fn unprovisioned_accounts_are_not_found() {
        let app = app();

        let (status, _) = post(&app, 999, json!({"value": 10, "type": "c", "description": "x"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = post_raw(&app, "999", "not json").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = statement(&app, "999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = statement(&app, "0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_id_is_unprocessable() {
        let app = app();
        let (status, _) = statement(&app, "abc").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, _) = post_raw(&app, "abc", r#"{"value": 1, "type": "c", "description": "x"}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn ids_wider_than_an_account_id_are_not_found() {
        let app = app();
        for id in ["99999999999", "-99999999999"] {
            let (status, _) = statement(&app, id).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "statement id {id}");
            let (status, _) = post_raw(&app, id, r#"{"value": 1, "type": "c", "description": "x"}"#).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "transaction id {id}");
        }
    }

    #[tokio::test]
    async fn transaction_balance_matches_statement() {
        let app = app();
        let (_, posted) = post(&app, 3, json!({"value": 12345, "type": "d", "description": "rt"})).await;
        let (_, read) = statement(&app, "3").await;
        assert_eq!(posted["balance"], read["balance"]["total"]);
        assert_eq!(posted["limit"], read["balance"]["limit"]);
    }
}
