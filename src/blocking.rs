//! Blocking wrappers over the asynchronous core.
//!
//! The protocol logic exists exactly once, in the async implementation;
//! these types drive it to completion on a dedicated single-worker runtime,
//! the way the `postgres` crate fronts `tokio-postgres`.

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

use crate::cursor::StatementResult;
use crate::error::{Error, Result};
use crate::options::PgConnectOptions;
use crate::protocol::TransactionStatus;
use crate::statement::Statement;

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("pgclient-blocking")
        .enable_all()
        .build()
        .expect("failed to start the blocking runtime")
});

/// A blocking connection to a PostgreSQL backend.
pub struct PgConnection {
    inner: crate::PgConnection,
}

impl PgConnection {
    /// Open a new connection described by a `key=value;` connection string.
    pub fn connect(connection_string: &str) -> Result<Self> {
        RUNTIME
            .block_on(crate::PgConnection::connect(connection_string))
            .map(|inner| Self { inner })
    }

    pub fn connect_with(options: &PgConnectOptions) -> Result<Self> {
        RUNTIME
            .block_on(crate::PgConnection::connect_with(options))
            .map(|inner| Self { inner })
    }

    /// Execute a pipeline of statements, returning every statement with its
    /// results and rows materialized.
    pub fn execute(&mut self, statements: Vec<Statement>) -> Result<Vec<StatementResult>> {
        RUNTIME.block_on(self.inner.execute_collect(statements))
    }

    /// Run `sql` through the simple-query protocol; returns the last
    /// statement's rows-affected count.
    pub fn execute_simple(&mut self, sql: &str) -> Result<u64> {
        RUNTIME.block_on(self.inner.execute_simple(sql))
    }

    pub fn prepare(&mut self, statement: &mut Statement) -> Result<()> {
        RUNTIME.block_on(self.inner.prepare(statement))
    }

    pub fn unprepare(&mut self, statement: &mut Statement) -> Result<()> {
        RUNTIME.block_on(self.inner.unprepare(statement))
    }

    pub fn backend_process_id(&self) -> u32 {
        self.inner.backend_process_id()
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        self.inner.transaction_status()
    }

    pub fn close(self) -> Result<()> {
        RUNTIME.block_on(self.inner.close())
    }
}

/// A blocking handle to a [`PgPool`][crate::PgPool].
#[derive(Clone)]
pub struct PgPool {
    inner: crate::PgPool,
}

impl PgPool {
    /// The process-wide pool for `connection_string`, created on first use.
    pub fn shared(connection_string: &str) -> Result<Self> {
        // enter the runtime so the pool can spawn its warm-up task
        let _guard = RUNTIME.enter();

        crate::PgPool::shared(connection_string).map(|inner| Self { inner })
    }

    pub fn new(options: PgConnectOptions) -> Result<Self> {
        let _guard = RUNTIME.enter();

        crate::PgPool::new(options).map(|inner| Self { inner })
    }

    pub fn acquire(&self) -> Result<PoolConnection> {
        RUNTIME
            .block_on(self.inner.acquire())
            .map(|inner| PoolConnection { inner: Some(inner) })
    }

    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    pub fn num_idle(&self) -> usize {
        self.inner.num_idle()
    }

    pub fn close(&self) {
        RUNTIME.block_on(self.inner.close());
    }
}

/// A connection checked out from a blocking pool handle; returned (and
/// reset) on drop.
pub struct PoolConnection {
    inner: Option<crate::pool::PoolConnection>,
}

impl PoolConnection {
    pub fn execute(&mut self, statements: Vec<Statement>) -> Result<Vec<StatementResult>> {
        RUNTIME.block_on(self.conn()?.execute_collect(statements))
    }

    pub fn execute_simple(&mut self, sql: &str) -> Result<u64> {
        RUNTIME.block_on(self.conn()?.execute_simple(sql))
    }

    pub fn backend_process_id(&self) -> u32 {
        self.inner
            .as_deref()
            .map(crate::PgConnection::backend_process_id)
            .unwrap_or(0)
    }

    fn conn(&mut self) -> Result<&mut crate::PgConnection, Error> {
        self.inner
            .as_deref_mut()
            .ok_or_else(|| Error::invalid_operation("the connection has been released"))
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        // the async return-to-pool machinery needs a runtime context to
        // spawn the reset task on
        let _guard = RUNTIME.enter();

        self.inner.take();
    }
}
