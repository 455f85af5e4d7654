//! PostgreSQL pool setup and leases.

use chrono::{DateTime, Utc};
use pgpulse_common::config::{DatabaseConfig, PoolConfig, TlsPolicy};
use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use crate::{ConnectionPool, DbError, Lease};

/// The status probe. Parameterless and read-only.
pub const SERVER_TIME_QUERY: &str = "SELECT now() AS time";

/// Map a [`TlsPolicy`] onto the driver's SSL mode.
///
/// `Require` encrypts without checking the server certificate.
pub fn ssl_mode(policy: TlsPolicy) -> PgSslMode {
    match (policy.required, policy.verify_server_cert) {
        (true, false) => PgSslMode::Require,
        (true, true) => PgSslMode::VerifyFull,
        (false, _) => PgSslMode::Prefer,
    }
}

/// Build connect options from configuration.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    // The constructor still picks up PG* variables from the process
    // environment, including PGSSLMODE. Every field we own is overwritten
    // here; ssl_mode goes last. The passfile is never consulted: its lookup
    // would run against the ambient host, not ours.
    PgConnectOptions::new_without_pgpass()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(ssl_mode(config.tls))
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, leased or idle.
    pub size: u32,
    pub idle: usize,
}

/// The process-wide PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStatusPool {
    pg: PgPool,
}

impl PgStatusPool {
    /// Create the pool without opening any connection; sessions are
    /// established on first acquire, up to `max_connections`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(db: &DatabaseConfig, pool: &PoolConfig) -> Self {
        tracing::info!(
            host = %db.host,
            port = db.port,
            database = %db.name,
            max_connections = pool.max_connections,
            acquire_timeout_secs = pool.acquire_timeout.as_secs(),
            "Configuring PostgreSQL pool"
        );

        let pg = PgPoolOptions::new()
            .max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .acquire_timeout(pool.acquire_timeout)
            .idle_timeout(pool.idle_timeout)
            .test_before_acquire(true)
            .connect_lazy_with(connect_options(db));

        Self { pg }
    }

    pub fn pg(&self) -> &PgPool {
        &self.pg
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pg.size(),
            idle: self.pg.num_idle(),
        }
    }
}

impl ConnectionPool for PgStatusPool {
    type Lease = PgLease;

    async fn acquire(&self) -> Result<PgLease, DbError> {
        let conn = self.pg.acquire().await.map_err(DbError::Acquire)?;
        tracing::trace!(stats = ?self.stats(), "Connection leased");
        Ok(PgLease { conn })
    }
}

/// A leased PostgreSQL connection. Returned to the pool on drop.
pub struct PgLease {
    conn: PoolConnection<Postgres>,
}

impl Lease for PgLease {
    async fn server_time(&mut self) -> Result<DateTime<Utc>, DbError> {
        match sqlx::query_scalar::<_, DateTime<Utc>>(SERVER_TIME_QUERY)
            .fetch_one(&mut *self.conn)
            .await
        {
            Ok(time) => Ok(time),
            Err(err) => {
                // Broken sessions are discarded rather than handed to the next caller.
                if is_transport_failure(&err) {
                    self.conn.close_on_drop();
                }
                Err(DbError::Query(err))
            }
        }
    }
}

fn is_transport_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_)
    )
}
