use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

use crate::connection::PgConnection;
use crate::error::Error;
use crate::options::PgConnectOptions;

#[derive(Debug)]
pub(super) struct PoolInner {
    pub(super) options: PgConnectOptions,

    /// One permit per connection the pool may have checked out or under
    /// construction; `Busy ≤ MaxPoolSize` falls out of holding a permit for
    /// the whole borrow.
    semaphore: Semaphore,

    /// Connections waiting to be reused, popped LIFO to keep a hot set warm.
    idle: Mutex<Vec<PgConnection>>,

    /// Live connections: idle + checked out + under construction.
    size: AtomicU32,

    is_closed: AtomicBool,
}

impl PoolInner {
    pub(super) fn new(options: PgConnectOptions) -> Arc<Self> {
        let capacity = options.max_pool_size as usize;

        let inner = Arc::new(PoolInner {
            semaphore: Semaphore::new(capacity),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            size: AtomicU32::new(0),
            is_closed: AtomicBool::new(false),
            options,
        });

        inner.spawn_min_connections();

        inner
    }

    pub(super) fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    pub(super) fn num_idle(&self) -> usize {
        self.idle.lock().len()
    }

    pub(super) fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    pub(super) async fn acquire(self: &Arc<Self>) -> Result<PgConnection, Error> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let deadline = self
            .options
            .acquire_timeout
            .map(|timeout| Instant::now() + timeout);

        // wait for a slot; a closed semaphore means the pool closed under us
        let permit = match deadline {
            Some(deadline) => timeout_at(deadline, self.semaphore.acquire())
                .await
                .map_err(|_| Error::PoolTimedOut)?,

            None => self.semaphore.acquire().await,
        }
        .map_err(|_| Error::PoolClosed)?;

        // the permit travels with the connection from here on; it is
        // restored in release/destroy
        permit.forget();

        // a released connection is pushed *before* its permit frees, so a
        // woken waiter finds it at the top of the stack
        if let Some(conn) = self.idle.lock().pop() {
            tracing::trace!(
                process_id = conn.backend_process_id(),
                "reusing idle connection"
            );

            return Ok(conn);
        }

        // no idle connection: the slot lets us build a fresh one, still
        // bounded by the acquire deadline
        self.size.fetch_add(1, Ordering::AcqRel);

        let connect = PgConnection::connect_with(&self.options);

        let result = match deadline {
            Some(deadline) => match timeout_at(deadline, connect).await {
                Ok(result) => result,
                Err(_) => Err(Error::PoolTimedOut),
            },

            None => connect.await,
        };

        match result {
            Ok(conn) => Ok(conn),

            Err(err) => {
                self.size.fetch_sub(1, Ordering::AcqRel);
                self.semaphore.add_permits(1);

                Err(err)
            }
        }
    }

    /// Take an idle connection if one is parked right now; never waits and
    /// never opens a new connection.
    pub(super) fn try_acquire(&self) -> Result<PgConnection, Error> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let permit = self
            .semaphore
            .try_acquire()
            .map_err(|_| Error::PoolExhausted)?;

        match self.idle.lock().pop() {
            Some(conn) => {
                permit.forget();
                Ok(conn)
            }

            // opening a fresh connection would mean waiting on the network
            None => Err(Error::PoolExhausted),
        }
    }

    /// Return a (already reset) connection to the idle set and wake one
    /// waiter.
    pub(super) fn release(&self, conn: PgConnection) {
        if self.is_closed() || conn.is_broken() {
            self.destroy(conn);
            return;
        }

        self.idle.lock().push(conn);
        self.semaphore.add_permits(1);
    }

    /// Free a slot whose connection is being disposed of by the caller.
    pub(super) fn destroy_slot(&self) {
        self.size.fetch_sub(1, Ordering::AcqRel);
        self.semaphore.add_permits(1);
    }

    /// Drop a connection out of the pool, freeing its slot.
    pub(super) fn destroy(&self, conn: PgConnection) {
        self.destroy_slot();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = conn.close().await;
            });
        }

        // without a runtime the socket still closes on drop, just without
        // the Terminate pleasantry
    }

    pub(super) async fn close(&self) {
        self.is_closed.store(true, Ordering::Release);

        // fail everyone waiting in acquire
        self.semaphore.close();

        let idle: Vec<PgConnection> = {
            let mut idle = self.idle.lock();
            idle.drain(..).collect()
        };

        for conn in idle {
            self.size.fetch_sub(1, Ordering::AcqRel);
            let _ = conn.close().await;
        }
    }

    /// Build the configured minimum number of connections in the background.
    fn spawn_min_connections(self: &Arc<Self>) {
        if self.options.min_pool_size == 0 {
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            // created outside a runtime; the pool simply starts cold
            Err(_) => return,
        };

        let pool = Arc::clone(self);

        handle.spawn(async move {
            while !pool.is_closed() && pool.size() < pool.options.min_pool_size {
                // stay under MaxPoolSize even while warming up
                let permit = match pool.semaphore.try_acquire() {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                permit.forget();

                pool.size.fetch_add(1, Ordering::AcqRel);

                match PgConnection::connect_with(&pool.options).await {
                    Ok(conn) => {
                        pool.idle.lock().push(conn);
                        pool.semaphore.add_permits(1);
                    }

                    Err(err) => {
                        pool.size.fetch_sub(1, Ordering::AcqRel);
                        pool.semaphore.add_permits(1);

                        tracing::warn!("error establishing a pooled connection: {err}");
                        break;
                    }
                }
            }
        });
    }
}
