use async_trait::async_trait;

use crate::{
    error::LedgerResult,
    ledger::{Balance, NewTransaction, Statement},
};

pub mod memory;
pub mod postgres;

/// Persistence for account balances and their transaction log.
///
/// `apply` is one atomic unit of work per account: read the balance under an
/// exclusive per-account lock, check it with [`Balance::apply`], then write the
/// new balance and append the entry, or change nothing at all. Units of work
/// on different accounts must not wait on each other.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn apply(&self, account_id: i32, tx: &NewTransaction) -> LedgerResult<Balance>;

    /// Balance plus the newest `max_entries` transactions, newest first, read
    /// from a single consistent view of the account.
    async fn statement(&self, account_id: i32, max_entries: usize) -> LedgerResult<Statement>;

    async fn close(&self) {}
}
