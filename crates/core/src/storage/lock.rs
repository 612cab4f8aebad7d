use anyhow::Context;

// Advisory locks are scoped to the Postgres session. This is used as a
// best-effort guard against concurrent fetch runs for the same market/chart.
const LOCK_NAMESPACE: i64 = 0x4348_5054_4C53; // "CHPTLS" as hex-ish namespace.

fn lock_key(country: &str, chart: &str) -> i64 {
    // FNV-1a over the market pair, folded into the namespace.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in country.bytes().chain([b'/']).chain(chart.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    LOCK_NAMESPACE ^ (hash as i64)
}

pub async fn try_acquire_fetch_lock(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
) -> anyhow::Result<bool> {
    let key = lock_key(country, chart);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_fetch_lock(
    pool: &sqlx::PgPool,
    country: &str,
    chart: &str,
) -> anyhow::Result<()> {
    let key = lock_key(country, chart);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}
