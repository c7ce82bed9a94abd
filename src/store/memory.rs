use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    error::{LedgerError, LedgerResult},
    ledger::{Balance, NewTransaction, Statement, StatementEntry},
    store::LedgerStore,
};

struct AccountLedger {
    balance: Balance,
    log: Vec<StatementEntry>,
}

/// Single-process store: one async mutex per account stands in for the row lock.
/// Each account keeps its full append-only log; statements read only the tail.
pub struct MemStore {
    accounts: scc::HashMap<i32, Arc<Mutex<AccountLedger>>>,
}

impl MemStore {
    /// Accounts as `(id, limit)` pairs, all starting at a zero balance.
    pub fn with_accounts(accounts: &[(i32, i64)]) -> MemStore {
        let map = scc::HashMap::new();
        for &(id, limit) in accounts {
            let account = AccountLedger {
                balance: Balance { balance: 0, limit },
                log: Vec::new(),
            };
            _ = map.insert(id, Arc::new(Mutex::new(account)));
        }
        MemStore { accounts: map }
    }

    async fn account(&self, account_id: i32) -> LedgerResult<Arc<Mutex<AccountLedger>>> {
        self.accounts
            .read_async(&account_id, |_, account| account.clone())
            .await
            .ok_or(LedgerError::NotFound(account_id.into()))
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn apply(&self, account_id: i32, tx: &NewTransaction) -> LedgerResult<Balance> {
        let account = self.account(account_id).await?;
        let mut account = account.lock().await;

        let updated = account.balance.apply(account_id, tx)?;
        account.log.push(StatementEntry {
            amount: tx.amount(),
            kind: tx.kind(),
            description: tx.description().to_string(),
            created_at: Utc::now(),
        });
        account.balance = updated;
        Ok(updated)
    }

    async fn statement(&self, account_id: i32, max_entries: usize) -> LedgerResult<Statement> {
        let account = self.account(account_id).await?;
        let account = account.lock().await;

        Ok(Statement {
            balance: account.balance,
            as_of: Utc::now(),
            transactions: account.log.iter().rev().take(max_entries).cloned().collect(),
        })
    }
}
