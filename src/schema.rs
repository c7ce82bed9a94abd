use anyhow::Context;
use deadpool_postgres::Pool;

/// Provisioned accounts as `(id, limit)`, every one starting at a zero balance.
pub const SEED_ACCOUNTS: [(i32, i64); 5] = [
    (1, 1000 * 100),
    (2, 800 * 100),
    (3, 10000 * 100),
    (4, 100000 * 100),
    (5, 5000 * 100),
];

const DDL: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY,
        \"limit\" BIGINT NOT NULL CHECK (\"limit\" >= 0),
        balance BIGINT NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS transactions (
        id BIGSERIAL PRIMARY KEY,
        account_id INTEGER NOT NULL REFERENCES accounts (id),
        amount BIGINT NOT NULL CHECK (amount > 0),
        description VARCHAR(10) NOT NULL,
        \"type\" CHAR(1) NOT NULL CHECK (\"type\" IN ('c', 'd')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_account_recent
        ON transactions (account_id, id DESC);
";

/// Creates the tables when missing and seeds the provisioned accounts.
/// Existing accounts keep their balances.
pub async fn mount(pool: &Pool) -> anyhow::Result<()> {
    let conn = pool.get().await.context("error getting db conn")?;
    conn.batch_execute(DDL).await.context("error creating schema")?;

    let seed = conn
        .prepare_cached("INSERT INTO accounts (id, \"limit\", balance) VALUES ($1, $2, 0) ON CONFLICT (id) DO NOTHING")
        .await
        .context("error preparing stmt (seed)")?;
    for (id, limit) in SEED_ACCOUNTS {
        conn.execute(&seed, &[&id, &limit]).await
            .with_context(|| format!("error seeding account {id}"))?;
    }

    tracing::info!(accounts = SEED_ACCOUNTS.len(), "schema mounted");
    Ok(())
}
