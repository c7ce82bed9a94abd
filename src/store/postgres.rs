use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{IsolationLevel, NoTls, Row};

use crate::{
    error::{LedgerError, LedgerResult, StorageError},
    ledger::{Balance, NewTransaction, Statement, StatementEntry, TransactionKind},
    store::LedgerStore,
};

const SELECT_FOR_UPDATE: &str = "SELECT balance, \"limit\" FROM accounts WHERE id = $1 FOR UPDATE";
const UPDATE_BALANCE: &str = "UPDATE accounts SET balance = $1 WHERE id = $2";
const INSERT_TRANSACTION: &str = "
    INSERT INTO transactions (account_id, amount, description, \"type\", created_at)
    VALUES ($1, $2, $3, $4, clock_timestamp())
";
const SELECT_ACCOUNT: &str = "SELECT balance, \"limit\", now() FROM accounts WHERE id = $1";
const SELECT_RECENT: &str = "
    SELECT amount, \"type\", description, created_at
    FROM transactions
    WHERE account_id = $1
    ORDER BY id DESC
    LIMIT $2
";

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub database_url: String,
    pub max_size: usize,
    pub connect_timeout: Duration,
    pub max_lifetime: Duration,
    pub max_idle: Duration,
    pub health_check_period: Duration,
}

pub fn create_pool(settings: &PoolSettings) -> anyhow::Result<Pool> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.url = Some(settings.database_url.clone());
    cfg.connect_timeout = Some(settings.connect_timeout);
    cfg.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Verified });

    let mut pool = PoolConfig::new(settings.max_size);
    pool.timeouts.wait = Some(settings.connect_timeout);
    pool.timeouts.create = Some(settings.connect_timeout);
    pool.timeouts.recycle = Some(settings.connect_timeout);
    cfg.pool = Some(pool);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("error creating pg pool")
}

/// Periodically pings the database and evicts connections past their
/// lifetime or idle budget. Exits once the pool is closed.
fn spawn_maintenance(pool: Pool, settings: &PoolSettings) {
    let period = settings.health_check_period;
    let max_lifetime = settings.max_lifetime;
    let max_idle = settings.max_idle;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }

            pool.retain(|_, metrics| metrics.age() < max_lifetime && metrics.last_used() < max_idle);

            if let Err(e) = ping(&pool).await {
                tracing::warn!("database health check failed: {e:#}");
            }
            let status = pool.status();
            tracing::debug!(size = status.size, available = status.available, waiting = status.waiting, "pool status");
        }
    });
}

async fn ping(pool: &Pool) -> anyhow::Result<()> {
    let conn = pool.get().await.context("error getting db conn")?;
    conn.simple_query("SELECT 1").await.context("error pinging database")?;
    Ok(())
}

/// Row-locking store on PostgreSQL. Replicas sharing one database stay
/// correct because every balance change holds the account's row lock.
pub struct PgStore {
    pool: Pool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: Pool, lock_timeout: Duration) -> PgStore {
        PgStore { pool, lock_timeout }
    }

    /// Builds the pool, checks the database answers and starts pool maintenance.
    pub async fn connect(settings: &PoolSettings, lock_timeout: Duration) -> anyhow::Result<PgStore> {
        let pool = create_pool(settings)?;
        ping(&pool).await?;
        spawn_maintenance(pool.clone(), settings);
        tracing::info!(max_size = settings.max_size, "connected to postgres");
        Ok(PgStore::new(pool, lock_timeout))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn entry_from_row(row: &Row) -> LedgerResult<StatementEntry> {
    let code: String = row.try_get(1)?;
    let kind = TransactionKind::from_code(code.trim())
        .map_err(|_| StorageError::MalformedRow(format!("transaction type {code:?}")))?;
    Ok(StatementEntry {
        amount: row.try_get(0)?,
        kind,
        description: row.try_get(2)?,
        created_at: row.try_get::<_, DateTime<Utc>>(3)?,
    })
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn apply(&self, account_id: i32, tx: &NewTransaction) -> LedgerResult<Balance> {
        let mut conn = self.pool.get().await?;
        let unit = conn.transaction().await?;
        unit.batch_execute(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis()))
            .await?;

        let select = unit.prepare_cached(SELECT_FOR_UPDATE).await?;
        let Some(row) = unit.query_opt(&select, &[&account_id]).await? else {
            unit.rollback().await?;
            return Err(LedgerError::NotFound(account_id.into()));
        };
        let current = Balance {
            balance: row.try_get(0)?,
            limit: row.try_get(1)?,
        };

        let updated = match current.apply(account_id, tx) {
            Ok(updated) => updated,
            Err(rejected) => {
                unit.rollback().await?;
                return Err(rejected);
            }
        };

        let update = unit.prepare_cached(UPDATE_BALANCE).await?;
        unit.execute(&update, &[&updated.balance, &account_id]).await?;
        let insert = unit.prepare_cached(INSERT_TRANSACTION).await?;
        unit.execute(&insert, &[&account_id, &tx.amount(), &tx.description(), &tx.kind().code()])
            .await?;
        unit.commit().await?;

        Ok(updated)
    }

    async fn statement(&self, account_id: i32, max_entries: usize) -> LedgerResult<Statement> {
        let mut conn = self.pool.get().await?;
        let snapshot = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await?;

        let select_account = snapshot.prepare_cached(SELECT_ACCOUNT).await?;
        let Some(account) = snapshot.query_opt(&select_account, &[&account_id]).await? else {
            snapshot.rollback().await?;
            return Err(LedgerError::NotFound(account_id.into()));
        };

        let select_recent = snapshot.prepare_cached(SELECT_RECENT).await?;
        let limit = i64::try_from(max_entries).unwrap_or(i64::MAX);
        let rows = snapshot.query(&select_recent, &[&account_id, &limit]).await?;
        snapshot.commit().await?;

        Ok(Statement {
            balance: Balance {
                balance: account.try_get(0)?,
                limit: account.try_get(1)?,
            },
            as_of: account.try_get(2)?,
            transactions: rows.iter().map(entry_from_row).collect::<LedgerResult<_>>()?,
        })
    }

    async fn close(&self) {
        self.pool.close();
        tracing::info!("postgres pool closed");
    }
}
