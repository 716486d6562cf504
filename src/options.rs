use std::env::var;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::types::TypeRegistry;

/// Hard upper bound on `MaxPoolSize` (and `MinPoolSize`).
pub const POOL_SIZE_LIMIT: u32 = 1024;

/// Whether to probe the server for TLS support before startup.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PgSslMode {
    /// Never probe; connect in plaintext.
    #[default]
    Disable,

    /// Probe with `SSLRequest`. This build carries no TLS stack, so a server
    /// that accepts the probe fails the connection rather than silently
    /// downgrading.
    Prefer,
}

/// Options for connecting to a PostgreSQL backend, parsed from a
/// case-insensitive `key=value;…` connection string or built up through the
/// setter methods.
///
/// Defaults come from the conventional environment variables (`PGHOST`,
/// `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`, `PGAPPNAME`).
#[derive(Debug, Clone)]
pub struct PgConnectOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) database: Option<String>,
    pub(crate) application_name: Option<String>,
    pub(crate) search_path: Option<String>,
    pub(crate) min_pool_size: u32,
    pub(crate) max_pool_size: u32,

    /// `None` waits forever (`Timeout=0`).
    pub(crate) acquire_timeout: Option<Duration>,

    /// `None` waits forever (`CommandTimeout=0`).
    pub(crate) command_timeout: Option<Duration>,

    pub(crate) pooling: bool,
    pub(crate) no_reset_on_close: bool,
    pub(crate) ssl_mode: PgSslMode,
    pub(crate) statement_cache_capacity: usize,
    pub(crate) type_registry: Arc<TypeRegistry>,
}

impl Default for PgConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PgConnectOptions {
    pub fn new() -> Self {
        let port = var("PGPORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5432);

        let host = var("PGHOST").ok().unwrap_or_else(|| "localhost".into());

        let username = var("PGUSER").ok().unwrap_or_else(whoami::username);

        PgConnectOptions {
            host,
            port,
            username,
            password: var("PGPASSWORD").ok(),
            database: var("PGDATABASE").ok(),
            application_name: var("PGAPPNAME").ok(),
            search_path: None,
            min_pool_size: 0,
            max_pool_size: 10,
            acquire_timeout: Some(Duration::from_secs(15)),
            command_timeout: Some(Duration::from_secs(30)),
            pooling: true,
            no_reset_on_close: false,
            ssl_mode: PgSslMode::Disable,
            statement_cache_capacity: 100,
            type_registry: TypeRegistry::shared(),
        }
    }

    /// Sets the name of the host to connect to.
    pub fn host(mut self, host: &str) -> Self {
        host.clone_into(&mut self.host);
        self
    }

    /// Sets the port to connect to at the server host.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        username.clone_into(&mut self.username);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_owned());
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_owned());
        self
    }

    /// Forwarded to the backend as the `application_name` startup parameter.
    pub fn application_name(mut self, application_name: &str) -> Self {
        self.application_name = Some(application_name.to_owned());
        self
    }

    /// Forwarded to the backend as the `search_path` startup parameter.
    pub fn search_path(mut self, search_path: &str) -> Self {
        self.search_path = Some(search_path.to_owned());
        self
    }

    /// Number of connections the pool opens eagerly.
    pub fn min_pool_size(mut self, min: u32) -> Self {
        self.min_pool_size = min;
        self
    }

    /// Hard cap on connections per pool.
    pub fn max_pool_size(mut self, max: u32) -> Self {
        self.max_pool_size = max;
        self
    }

    /// How long [`PgPool::acquire`][crate::PgPool::acquire] waits for a
    /// connection; `None` waits forever.
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Deadline for a single execute; `None` waits forever.
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// `false` bypasses the shared pool registry entirely.
    pub fn pooling(mut self, pooling: bool) -> Self {
        self.pooling = pooling;
        self
    }

    /// Skip the `DISCARD ALL` normally issued when a connection returns to
    /// the pool.
    pub fn no_reset_on_close(mut self, no_reset: bool) -> Self {
        self.no_reset_on_close = no_reset;
        self
    }

    pub fn ssl_mode(mut self, ssl_mode: PgSslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// How many prepared statements each connection caches by SQL text.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Use a custom type-handler registry instead of the built-in one.
    pub fn type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.type_registry = registry;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.max_pool_size == 0 || self.max_pool_size > POOL_SIZE_LIMIT {
            return Err(Error::config(format!(
                "MaxPoolSize must be between 1 and {POOL_SIZE_LIMIT}"
            )));
        }

        if self.min_pool_size > POOL_SIZE_LIMIT {
            return Err(Error::config(format!(
                "MinPoolSize must be at most {POOL_SIZE_LIMIT}"
            )));
        }

        if self.min_pool_size > self.max_pool_size {
            return Err(Error::config(
                "MinPoolSize must not exceed MaxPoolSize",
            ));
        }

        Ok(())
    }
}

impl FromStr for PgConnectOptions {
    type Err = Error;

    /// Parse a `key=value;…` connection string. Keys are case-insensitive
    /// and may contain spaces (`Max Pool Size` equals `MaxPoolSize`).
    fn from_str(s: &str) -> Result<Self, Error> {
        let mut options = PgConnectOptions::new();

        for pair in s.split(';') {
            let pair = pair.trim();

            if pair.is_empty() {
                continue;
            }

            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::config(format!("expected key=value, got {pair:?}")))?;

            let normalized: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            let value = value.trim();

            options = match normalized.as_str() {
                "host" | "server" => options.host(value),
                "port" => options.port(parse_num(&normalized, value)?),
                "database" => options.database(value),
                "username" | "user" | "userid" => options.username(value),
                "password" => options.password(value),
                "applicationname" => options.application_name(value),
                "searchpath" => options.search_path(value),
                "minpoolsize" => options.min_pool_size(parse_num(&normalized, value)?),
                "maxpoolsize" => options.max_pool_size(parse_num(&normalized, value)?),
                "timeout" => options.acquire_timeout(parse_seconds(&normalized, value)?),
                "commandtimeout" => options.command_timeout(parse_seconds(&normalized, value)?),
                "pooling" => options.pooling(parse_bool(&normalized, value)?),
                "noresetonclose" => options.no_reset_on_close(parse_bool(&normalized, value)?),

                "sslmode" => match value.to_ascii_lowercase().as_str() {
                    "disable" => options.ssl_mode(PgSslMode::Disable),
                    "prefer" => options.ssl_mode(PgSslMode::Prefer),
                    _ => {
                        return Err(Error::config(format!(
                            "unsupported SslMode value {value:?}"
                        )))
                    }
                },

                // the client speaks UTF-8 and nothing else
                "encoding" | "clientencoding" => {
                    if value.eq_ignore_ascii_case("utf8") || value.eq_ignore_ascii_case("utf-8") {
                        options
                    } else {
                        return Err(Error::config(format!(
                            "unsupported Encoding value {value:?}; only UTF-8 is supported"
                        )));
                    }
                }

                _ => {
                    return Err(Error::config(format!(
                        "unknown connection string key {key:?}"
                    )))
                }
            };
        }

        options.validate()?;

        Ok(options)
    }
}

fn parse_num<T: FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::config(format!("invalid numeric value {value:?} for {key}")))
}

fn parse_seconds(key: &str, value: &str) -> Result<Option<Duration>, Error> {
    let seconds: u64 = parse_num(key, value)?;

    // zero means "wait forever"
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::config(format!(
            "invalid boolean value {value:?} for {key}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_a_connection_string() {
        let options: PgConnectOptions =
            "Host=db.example.com;Port=5433;Database=app;Username=app;Password=hunter2;\
             MinPoolSize=2;MaxPoolSize=16;Timeout=5;ApplicationName=worker"
                .parse()
                .unwrap();

        assert_eq!(options.host, "db.example.com");
        assert_eq!(options.port, 5433);
        assert_eq!(options.database.as_deref(), Some("app"));
        assert_eq!(options.username, "app");
        assert_eq!(options.password.as_deref(), Some("hunter2"));
        assert_eq!(options.min_pool_size, 2);
        assert_eq!(options.max_pool_size, 16);
        assert_eq!(options.acquire_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.application_name.as_deref(), Some("worker"));
    }

    #[test]
    fn keys_are_case_insensitive_and_may_contain_spaces() {
        let options: PgConnectOptions = "HOST=h;max pool size=3;No Reset On Close=true"
            .parse()
            .unwrap();

        assert_eq!(options.host, "h");
        assert_eq!(options.max_pool_size, 3);
        assert!(options.no_reset_on_close);
    }

    #[test]
    fn timeout_zero_means_infinite() {
        let options: PgConnectOptions = "Timeout=0;CommandTimeout=0".parse().unwrap();

        assert_eq!(options.acquire_timeout, None);
        assert_eq!(options.command_timeout, None);
    }

    #[test]
    fn it_rejects_min_above_max() {
        let err = "MinPoolSize=8;MaxPoolSize=4"
            .parse::<PgConnectOptions>()
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn it_rejects_sizes_above_the_limit() {
        assert!("MaxPoolSize=1025".parse::<PgConnectOptions>().is_err());
        assert!("MinPoolSize=1025;MaxPoolSize=1024"
            .parse::<PgConnectOptions>()
            .is_err());
    }

    #[test]
    fn it_rejects_unknown_keys_and_encodings() {
        assert!("Fetch Size=10".parse::<PgConnectOptions>().is_err());
        assert!("Encoding=latin1".parse::<PgConnectOptions>().is_err());
        assert!("Encoding=UTF8".parse::<PgConnectOptions>().is_ok());
    }
}
