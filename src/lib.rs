//! An asynchronous PostgreSQL client speaking the frontend/backend wire
//! protocol (version 3) over TCP, with pipelined extended queries and a
//! connection pool.
//!
//! The quickest way in is the pool:
//!
//! ```no_run
//! use pgclient::{PgPool, Statement};
//!
//! # async fn example() -> pgclient::Result<()> {
//! let pool = PgPool::shared("Host=localhost;Database=app;Username=app")?;
//! let mut conn = pool.acquire().await?;
//!
//! let mut reader = conn
//!     .execute(vec![Statement::new("SELECT $1 + 1").bind(41_i32)])
//!     .await?;
//!
//! while let Some(row) = reader.read().await? {
//!     let answer: i32 = row.try_get(0)?;
//!     println!("{answer}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A [`PgConnection`] can equally be opened directly, bypassing pooling.
//! Statements carry positional placeholders (`$1`, `$2`, …) only; rewriting
//! named parameters is left to layers above this crate.

#[macro_use]
mod error;

mod connection;
mod cursor;
mod io;
mod net;
mod options;
mod pool;
mod protocol;
mod row;
mod statement;
mod types;

pub mod blocking;

pub use connection::{ConnectorState, NoticeHandler, PgConnection};
pub use cursor::{PgDataReader, StatementResult};
pub use error::{BoxDynError, Error, PgDatabaseError, Result};
pub use options::{PgConnectOptions, PgSslMode, POOL_SIZE_LIMIT};
pub use pool::{PgPool, PoolConnection};
pub use protocol::{Notice, PgSeverity, TransactionStatus};
pub use row::PgRow;
pub use statement::{
    ParameterDirection, PgColumn, PgParameter, Statement, StatementType,
};
pub use types::{
    oid, Oid, PgDecode, PgValue, PgValueFormat, PgValueRef, TypeHandler, TypeRegistry,
};
