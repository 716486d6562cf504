use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::Error;
use crate::options::PgConnectOptions;
use crate::pool::PgPool;

/// Process-wide pools, keyed by the exact connection-string text.
static POOLS: Lazy<Mutex<HashMap<String, PgPool>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl PgPool {
    /// The process-wide pool for `connection_string`, created on first use.
    ///
    /// Two callers passing the same string share one pool; a string that
    /// differs in any byte gets its own. A connection string carrying
    /// `Pooling=false` never lands here; open a
    /// [`PgConnection`][crate::PgConnection] directly instead.
    pub fn shared(connection_string: &str) -> Result<PgPool, Error> {
        let mut pools = POOLS.lock();

        if let Some(pool) = pools.get(connection_string) {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
        }

        let options: PgConnectOptions = connection_string.parse()?;

        if !options.pooling {
            return Err(Error::config(
                "the connection string disables pooling; connect directly with PgConnection",
            ));
        }

        let pool = PgPool::new(options)?;

        pools.insert(connection_string.to_owned(), pool.clone());

        Ok(pool)
    }
}
