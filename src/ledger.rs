use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::time::{timeout_at, Instant};

use crate::{
    error::{LedgerError, LedgerResult, StorageError},
    store::LedgerStore,
};

/// Number of entries returned by a statement.
pub const STATEMENT_SIZE: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn from_code(code: &str) -> LedgerResult<Self> {
        match code {
            "c" => Ok(Self::Credit),
            "d" => Ok(Self::Debit),
            other => Err(LedgerError::invalid(format!("unknown transaction type {other:?}"))),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::Credit => "c",
            Self::Debit => "d",
        }
    }
}

/// A validated transaction request, not yet applied to any account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    amount: i64,
    kind: TransactionKind,
    description: String,
}

impl NewTransaction {
    pub fn new(amount: i64, kind: &str, description: impl Into<String>) -> LedgerResult<Self> {
        if amount <= 0 {
            return Err(LedgerError::invalid(format!("amount must be positive, got {amount}")));
        }
        let kind = TransactionKind::from_code(kind)?;
        let description = description.into();
        let description_len = description.chars().count();
        if !(1..=MAX_DESCRIPTION_LEN).contains(&description_len) {
            return Err(LedgerError::invalid(format!(
                "description must have between 1 and {MAX_DESCRIPTION_LEN} characters, got {description_len}"
            )));
        }
        Ok(Self { amount, kind, description })
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub balance: i64,
    pub limit: i64,
}

impl Balance {
    /// The balance after `tx` is applied, or why it cannot be.
    ///
    /// Stores call this between the locked read and the write, so the check
    /// always sees the latest committed balance.
    pub fn apply(self, account_id: i32, tx: &NewTransaction) -> LedgerResult<Balance> {
        let candidate = match tx.kind {
            TransactionKind::Credit => self.balance.checked_add(tx.amount),
            TransactionKind::Debit => self.balance.checked_sub(tx.amount),
        }
        .ok_or_else(|| LedgerError::invalid(format!("amount {} overflows the balance", tx.amount)))?;

        if tx.kind == TransactionKind::Debit && candidate < -self.limit {
            return Err(LedgerError::LimitExceeded {
                account_id,
                amount: tx.amount,
                limit: self.limit,
            });
        }

        Ok(Balance { balance: candidate, limit: self.limit })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementEntry {
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Balance and newest-first recent history, read as of one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub balance: Balance,
    pub as_of: DateTime<Utc>,
    pub transactions: Vec<StatementEntry>,
}

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    max_account_id: i32,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, max_account_id: i32) -> Ledger {
        Ledger { store, max_account_id }
    }

    /// Bounds check against the provisioned id range; touches no storage.
    pub fn check_account(&self, account_id: i32) -> LedgerResult<()> {
        if account_id < 1 || account_id > self.max_account_id {
            return Err(LedgerError::NotFound(account_id.into()));
        }
        Ok(())
    }

    pub async fn apply_transaction(
        &self,
        account_id: i32,
        amount: i64,
        kind: &str,
        description: &str,
        deadline: Instant,
    ) -> LedgerResult<Balance> {
        self.check_account(account_id)?;
        let tx = NewTransaction::new(amount, kind, description)?;
        let balance = within(deadline, self.store.apply(account_id, &tx)).await?;
        tracing::debug!(account_id, balance = balance.balance, "transaction recorded");
        Ok(balance)
    }

    pub async fn statement(&self, account_id: i32, deadline: Instant) -> LedgerResult<Statement> {
        self.check_account(account_id)?;
        within(deadline, self.store.statement(account_id, STATEMENT_SIZE)).await
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

async fn within<T>(deadline: Instant, op: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
    timeout_at(deadline, op)
        .await
        .map_err(|_| LedgerError::Storage(StorageError::Timeout))?
}
