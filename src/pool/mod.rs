//! A pool of reusable backend connections.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::connection::PgConnection;
use crate::error::Error;
use crate::options::PgConnectOptions;

mod inner;
mod registry;

use inner::PoolInner;

/// A per-connection-string pool of backend connections.
///
/// `acquire` hands out an idle connection (LIFO) or opens a new one while
/// under `MaxPoolSize`; past the cap, acquirers queue until a connection is
/// released or the configured `Timeout` passes. Released connections are
/// reset (`DISCARD ALL`) before anyone else can see them.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone, Debug)]
pub struct PgPool(Arc<PoolInner>);

impl PgPool {
    /// Create an independent pool from `options`.
    ///
    /// Use [`shared`][Self::shared] to get the process-wide pool for a
    /// connection string instead.
    pub fn new(options: PgConnectOptions) -> Result<Self, Error> {
        options.validate()?;

        Ok(PgPool(PoolInner::new(options)))
    }

    /// Retrieve a connection from the pool, waiting at most the configured
    /// `Timeout` for one to become available.
    pub async fn acquire(&self) -> Result<PoolConnection, Error> {
        let conn = self.0.acquire().await?;

        Ok(PoolConnection {
            live: Some(conn),
            pool: Arc::clone(&self.0),
        })
    }

    /// Take an already idle connection without waiting.
    ///
    /// Fails with [`Error::PoolExhausted`] when nothing is parked.
    pub fn try_acquire(&self) -> Result<PoolConnection, Error> {
        let conn = self.0.try_acquire()?;

        Ok(PoolConnection {
            live: Some(conn),
            pool: Arc::clone(&self.0),
        })
    }

    /// The number of live connections: idle plus checked out.
    pub fn size(&self) -> u32 {
        self.0.size()
    }

    /// The number of connections currently idle in the pool.
    pub fn num_idle(&self) -> usize {
        self.0.num_idle()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Prevent new acquisitions and close every idle connection. Checked-out
    /// connections are closed as they come back.
    pub async fn close(&self) {
        self.0.close().await;
    }
}

const DEREF_ERR: &str = "(bug) connection already released to pool";

/// A connection checked out from a [`PgPool`].
///
/// Returned to the pool on drop: the connection is reset in a background
/// task and then parked for the next borrower (or handed to a waiter).
#[derive(Debug)]
pub struct PoolConnection {
    live: Option<PgConnection>,
    pool: Arc<PoolInner>,
}

impl PoolConnection {
    /// Detach the connection from the pool and close it gracefully, instead
    /// of returning it.
    pub async fn close(mut self) -> Result<(), Error> {
        if let Some(conn) = self.live.take() {
            // free the slot without re-parking the connection
            self.pool.destroy_slot();

            conn.close().await?;
        }

        Ok(())
    }
}

impl Deref for PoolConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        self.live.as_ref().expect(DEREF_ERR)
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.live.as_mut().expect(DEREF_ERR)
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let Some(mut conn) = self.live.take() {
            let pool = Arc::clone(&self.pool);

            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                // reset runs outside any pool lock; a connection that fails
                // its reset is destroyed rather than pooled
                handle.spawn(async move {
                    if pool.is_closed() || conn.is_broken() {
                        pool.destroy(conn);
                        return;
                    }

                    match conn.reset().await {
                        Ok(()) => pool.release(conn),
                        Err(err) => {
                            tracing::debug!("connection failed reset, destroying: {err}");
                            pool.destroy(conn);
                        }
                    }
                });
            } else {
                // no runtime to return on; drop the connection outright
                pool.destroy(conn);
            }
        }
    }
}
