//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mssql_client::{Client, Config};
use mssql_client::state::Ready;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::ConnectionMetadata;

/// A connection pool for SQL Server.
///
/// The pool manages a set of database connections, providing automatic
/// connection reuse, health checking via `SELECT 1` (or a custom query),
/// and `sp_reset_connection` cleanup on return.
///
/// Connections are acquired with [`Pool::get`] and returned automatically
/// when the returned [`PooledConnection`] is dropped.
pub struct Pool {
    inner: Arc<PoolInner>,
}

/// An idle connection carries the semaphore permit for its slot so that
/// reusing it never re-acquires capacity already spent on opening it.
struct IdleConn {
    client: Client<Ready>,
    metadata: ConnectionMetadata,
    permit: OwnedSemaphorePermit,
}

struct PoolInner {
    client_config: Config,
    pool_config: PoolConfig,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConn>>,
    closed: Mutex<bool>,
    next_id: AtomicU64,
    in_use: AtomicU32,
    metrics: MetricsInner,
}

#[derive(Default)]
struct MetricsInner {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts_successful: AtomicU64,
    checkouts_failed: AtomicU64,
    health_checks_performed: AtomicU64,
    health_checks_failed: AtomicU64,
    resets_performed: AtomicU64,
    resets_failed: AtomicU64,
}

impl PoolInner {
    async fn open_connection(self: &Arc<Self>) -> Result<(Client<Ready>, ConnectionMetadata), PoolError> {
        let client = Client::connect(self.client_config.clone())
            .await
            .map_err(|e| PoolError::ConnectionCreation(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .connections_created
            .fetch_add(1, Ordering::Relaxed);
        Ok((client, ConnectionMetadata::new(id)))
    }

    async fn health_check(&self, client: &mut Client<Ready>) -> Result<(), PoolError> {
        self.metrics
            .health_checks_performed
            .fetch_add(1, Ordering::Relaxed);
        let query: &str = &self.pool_config.health_check_query;
        match client.simple_query(query).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.metrics
                    .health_checks_failed
                    .fetch_add(1, Ordering::Relaxed);
                Err(PoolError::UnhealthyConnection(e.to_string()))
            }
        }
    }

    /// Return a checked-out connection to the idle queue, resetting server
    /// state first if configured. Called from a detached task so the
    /// `sp_reset_connection` round trip never runs inside `Drop`.
    async fn release(self: Arc<Self>, mut client: Client<Ready>, mut metadata: ConnectionMetadata, permit: OwnedSemaphorePermit) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);

        if *self.closed.lock() {
            drop(permit);
            self.metrics
                .connections_closed
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        if self.pool_config.sp_reset_connection {
            match client.simple_query("sp_reset_connection").await {
                Ok(()) => {
                    self.metrics
                        .resets_performed
                        .fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.metrics.resets_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(error = %e, "connection reset failed, discarding connection");
                    drop(permit);
                    self.metrics
                        .connections_closed
                        .fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }

        if self.pool_config.test_on_checkin && self.health_check(&mut client).await.is_err() {
            drop(permit);
            self.metrics
                .connections_closed
                .fetch_add(1, Ordering::Relaxed);
            return;
        }

        metadata.mark_checkin();
        self.idle.lock().push_back(IdleConn {
            client,
            metadata,
            permit,
        });
    }
}

impl Pool {
    /// Create a new pool with the given pool and client configuration.
    ///
    /// Spawns a best-effort background task to pre-warm `min_connections`
    /// connections; failures during warm-up are logged, not propagated,
    /// since the pool can still serve `get()` by connecting lazily.
    pub async fn new(pool_config: PoolConfig, client_config: Config) -> Result<Self, PoolError> {
        pool_config.validate()?;

        let inner = Arc::new(PoolInner {
            semaphore: Arc::new(Semaphore::new(pool_config.max_connections as usize)),
            client_config,
            pool_config,
            idle: Mutex::new(VecDeque::new()),
            closed: Mutex::new(false),
            next_id: AtomicU64::new(0),
            in_use: AtomicU32::new(0),
            metrics: MetricsInner::default(),
        });

        let warm = Arc::clone(&inner);
        let min_connections = warm.pool_config.min_connections;
        tokio::spawn(async move {
            for _ in 0..min_connections {
                let Ok(permit) = Arc::clone(&warm.semaphore).try_acquire_owned() else {
                    break;
                };
                match warm.open_connection().await {
                    Ok((client, metadata)) => {
                        warm.idle.lock().push_back(IdleConn {
                            client,
                            metadata,
                            permit,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to pre-warm pool connection");
                        drop(permit);
                        break;
                    }
                }
            }
        });

        Ok(Self { inner })
    }

    /// Start building a pool with a fluent configuration API.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    /// Get a connection from the pool.
    ///
    /// Returns an existing idle connection (after an optional health check)
    /// or opens a new one if the pool has spare capacity. If the pool is at
    /// `max_connections`, waits up to `connection_timeout` for one to free up.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        if *self.inner.closed.lock() {
            self.inner
                .metrics
                .checkouts_failed
                .fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");

        let deadline = tokio::time::Instant::now() + self.inner.pool_config.connection_timeout;

        loop {
            let idle = self.inner.idle.lock().pop_front();
            if let Some(IdleConn {
                mut client,
                mut metadata,
                permit,
            }) = idle
            {
                if self.inner.pool_config.test_on_checkout
                    && self.inner.health_check(&mut client).await.is_err()
                {
                    drop(permit);
                    self.inner
                        .metrics
                        .connections_closed
                        .fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                metadata.mark_checkout();
                self.inner.in_use.fetch_add(1, Ordering::Relaxed);
                self.inner
                    .metrics
                    .checkouts_successful
                    .fetch_add(1, Ordering::Relaxed);
                return Ok(PooledConnection {
                    pool: Arc::clone(&self.inner),
                    client: Some(client),
                    metadata,
                    permit: Some(permit),
                    detached: false,
                });
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let permit = match tokio::time::timeout(
                remaining,
                Arc::clone(&self.inner.semaphore).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    self.inner
                        .metrics
                        .checkouts_failed
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::PoolClosed);
                }
                Err(_) => {
                    self.inner
                        .metrics
                        .checkouts_failed
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(PoolError::Timeout);
                }
            };

            match self.inner.open_connection().await {
                Ok((client, mut metadata)) => {
                    metadata.mark_checkout();
                    self.inner.in_use.fetch_add(1, Ordering::Relaxed);
                    self.inner
                        .metrics
                        .checkouts_successful
                        .fetch_add(1, Ordering::Relaxed);
                    return Ok(PooledConnection {
                        pool: Arc::clone(&self.inner),
                        client: Some(client),
                        metadata,
                        permit: Some(permit),
                        detached: false,
                    });
                }
                Err(e) => {
                    drop(permit);
                    self.inner
                        .metrics
                        .checkouts_failed
                        .fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
    }

    /// Try to get a connection without waiting or opening a new one.
    ///
    /// Returns `Ok(None)` if the pool has no idle connection ready right now,
    /// even when the pool is under `max_connections` and could open a new one.
    pub fn try_get(&self) -> Result<Option<PooledConnection>, PoolError> {
        if *self.inner.closed.lock() {
            return Err(PoolError::PoolClosed);
        }

        let Some(IdleConn {
            client,
            mut metadata,
            permit,
        }) = self.inner.idle.lock().pop_front()
        else {
            return Ok(None);
        };

        metadata.mark_checkout();
        self.inner.in_use.fetch_add(1, Ordering::Relaxed);
        self.inner
            .metrics
            .checkouts_successful
            .fetch_add(1, Ordering::Relaxed);

        Ok(Some(PooledConnection {
            pool: Arc::clone(&self.inner),
            client: Some(client),
            metadata,
            permit: Some(permit),
            detached: false,
        }))
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let in_use = self.inner.in_use.load(Ordering::Relaxed);
        let available = self.inner.idle.lock().len() as u32;
        PoolStatus {
            available,
            in_use,
            total: available + in_use,
            max: self.inner.pool_config.max_connections,
        }
    }

    /// Get a snapshot of pool lifecycle metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let m = &self.inner.metrics;
        PoolMetrics {
            connections_created: m.connections_created.load(Ordering::Relaxed),
            connections_closed: m.connections_closed.load(Ordering::Relaxed),
            checkouts_successful: m.checkouts_successful.load(Ordering::Relaxed),
            checkouts_failed: m.checkouts_failed.load(Ordering::Relaxed),
            health_checks_performed: m.health_checks_performed.load(Ordering::Relaxed),
            health_checks_failed: m.health_checks_failed.load(Ordering::Relaxed),
            resets_performed: m.resets_performed.load(Ordering::Relaxed),
            resets_failed: m.resets_failed.load(Ordering::Relaxed),
        }
    }

    /// Close the pool, dropping all idle connections.
    ///
    /// Connections already checked out are returned to their caller and
    /// discarded (not reset or reused) when they are subsequently dropped.
    pub async fn close(&self) {
        *self.inner.closed.lock() = true;
        let idle: Vec<IdleConn> = self.inner.idle.lock().drain(..).collect();
        for conn in idle {
            let _ = conn.client.close().await;
            self.inner
                .metrics
                .connections_closed
                .fetch_add(1, Ordering::Relaxed);
        }
        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.pool_config
    }
}

/// Fluent builder for [`Pool`].
#[derive(Default)]
pub struct PoolBuilder {
    client_config: Option<Config>,
    pool_config: PoolConfig,
}

impl PoolBuilder {
    /// Set the client connection configuration used to open new connections.
    #[must_use]
    pub fn client_config(mut self, config: Config) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Set the minimum number of connections to maintain.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config = self.pool_config.min_connections(count);
        self
    }

    /// Set the maximum number of connections allowed.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config = self.pool_config.max_connections(count);
        self
    }

    /// Set the time to wait for a connection before timing out.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config = self.pool_config.connection_timeout(timeout);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config = self.pool_config.idle_timeout(timeout);
        self
    }

    /// Use an existing [`PoolConfig`] wholesale.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Build the pool, validating configuration and pre-warming connections.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let client_config = self.client_config.ok_or_else(|| {
            PoolError::Configuration("client_config is required to build a pool".into())
        })?;
        Pool::new(self.pool_config, client_config).await
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Percentage of `max` currently checked out, in `[0.0, 100.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.in_use) / f64::from(self.max) * 100.0
        }
    }
}

/// Cumulative lifecycle counters for a pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMetrics {
    /// Total connections created over the pool's lifetime.
    pub connections_created: u64,
    /// Total connections closed (discarded or closed at shutdown).
    pub connections_closed: u64,
    /// Successful `get`/`try_get` calls.
    pub checkouts_successful: u64,
    /// Failed `get`/`try_get` calls (timeout, closed pool, connect failure).
    pub checkouts_failed: u64,
    /// Health checks attempted.
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// `sp_reset_connection` calls attempted.
    pub resets_performed: u64,
    /// `sp_reset_connection` calls that failed.
    pub resets_failed: u64,
}

impl PoolMetrics {
    /// Fraction of checkouts that succeeded, in `[0.0, 1.0]`.
    ///
    /// Returns `1.0` when no checkouts have been attempted yet.
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            1.0
        } else {
            self.checkouts_successful as f64 / total as f64
        }
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is reset (if `sp_reset_connection` is
/// enabled) and returned to the pool's idle queue on a background task.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    client: Option<Client<Ready>>,
    metadata: ConnectionMetadata,
    permit: Option<OwnedSemaphorePermit>,
    detached: bool,
}

impl PooledConnection {
    /// Metadata about this connection (id, checkout count, timestamps).
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// Detach the connection from the pool, returning the underlying client.
    ///
    /// The connection will not be reset or returned to the pool. The caller
    /// takes ownership of the client and is responsible for closing it.
    pub fn detach(mut self) -> Option<Client<Ready>> {
        self.detached = true;
        self.pool.in_use.fetch_sub(1, Ordering::Relaxed);
        self.permit.take();
        self.client.take()
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = Client<Ready>;

    fn deref(&self) -> &Self::Target {
        self.client
            .as_ref()
            .expect("client present for the lifetime of a non-detached PooledConnection")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.client
            .as_mut()
            .expect("client present for the lifetime of a non-detached PooledConnection")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(client) = self.client.take() else {
            return;
        };
        let Some(permit) = self.permit.take() else {
            return;
        };
        let pool = Arc::clone(&self.pool);
        let metadata = self.metadata.clone();
        tracing::trace!("returning connection to pool");
        tokio::spawn(async move {
            pool.release(client, metadata, permit).await;
        });
    }
}
