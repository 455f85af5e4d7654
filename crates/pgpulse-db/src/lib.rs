//! # pgpulse-db
//!
//! Connection pool manager. The status route is written against the
//! [`ConnectionPool`] / [`Lease`] pair defined here, so tests can substitute a
//! fake pool; [`postgres`] holds the real implementation.
//!
//! A lease is released when it is dropped. [`Lease::release`] exists so call
//! sites can make the hand-back explicit, but every exit path (early return,
//! `?`, panic) releases regardless.

pub mod postgres;

use chrono::{DateTime, Utc};
use std::future::Future;

pub use postgres::{PgLease, PgStatusPool, PoolStats};

/// Failures surfaced by the pool manager, split by stage.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// No usable connection could be leased (exhaustion, network, auth, TLS).
    #[error("Database connection failed: {0}")]
    Acquire(#[source] sqlx::Error),

    /// A connection was leased but the query failed.
    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    /// Client-facing category string.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Acquire(_) => "Database connection failed",
            Self::Query(_) => "Query failed",
        }
    }

    /// The underlying driver error.
    pub fn driver_error(&self) -> &sqlx::Error {
        match self {
            Self::Acquire(e) | Self::Query(e) => e,
        }
    }
}

/// A shared source of database leases.
pub trait ConnectionPool: Send + Sync + 'static {
    type Lease: Lease;

    /// Lease a connection, waiting (bounded) if the pool is at its ceiling.
    fn acquire(&self) -> impl Future<Output = Result<Self::Lease, DbError>> + Send;
}

/// Exclusive, temporary ownership of one pooled connection.
pub trait Lease: Send {
    /// Run the fixed read-only timestamp query.
    fn server_time(&mut self) -> impl Future<Output = Result<DateTime<Utc>, DbError>> + Send;

    /// Hand the connection back to its pool.
    fn release(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
