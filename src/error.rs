//! Error and Result types.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::io;

use crate::protocol::{Notice, PgSeverity};

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A boxed error at the edges of the type-handler interface.
pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// A generic error that represents all the ways a method can fail inside the
/// client.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error communicating with the backend over the socket.
    ///
    /// This includes the peer closing the connection mid-message
    /// ([`io::ErrorKind::UnexpectedEof`]). Fatal to the connection.
    #[error("error communicating with the backend: {0}")]
    Io(#[from] io::Error),

    /// The connection string or pool configuration was invalid.
    #[error("error with configuration: {0}")]
    Configuration(Box<str>),

    /// The startup handshake was rejected, or requires an authentication
    /// method this client does not speak.
    #[error("authentication failed: {0}")]
    Authentication(Box<str>),

    /// Unexpected or invalid data was encountered. This generally means the
    /// backend sent a message we did not expect at that point of the
    /// protocol, or a frame we could not understand. Fatal to the connection.
    #[error("encountered unexpected or invalid data: {0}")]
    Protocol(Box<str>),

    /// An `ErrorResponse` returned by the backend.
    ///
    /// The connection remains usable once the pipeline's `ReadyForQuery`
    /// has been consumed.
    #[error(transparent)]
    Database(Box<PgDatabaseError>),

    /// The caller misused an otherwise healthy connection: submitted an
    /// output-direction parameter, executed on a broken connection, and
    /// the like.
    #[error("{0}")]
    InvalidOperation(Box<str>),

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// A column could not be decoded into the requested type.
    #[error("error decoding column {index}: {source}")]
    ColumnDecode {
        index: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A value could not be encoded as a statement parameter.
    #[error("error encoding parameter ${index}: {source}")]
    ParameterEncode {
        /// One-based, matching the `$n` placeholder.
        index: usize,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The per-command deadline elapsed before the backend replied. A cancel
    /// request has been issued; if the backend did not honor it the
    /// connection is left broken.
    #[error("the command deadline elapsed before the backend replied")]
    CommandTimedOut,

    /// [`PgPool::acquire`][crate::PgPool::acquire] timed out waiting for a
    /// connection to become available.
    #[error("timed out while waiting for an open connection")]
    PoolTimedOut,

    /// The pool is at capacity and was asked not to wait.
    #[error("the pool is at capacity and no acquire deadline was given")]
    PoolExhausted,

    /// [`PgPool::close`][crate::PgPool::close] was called while waiting in
    /// [`PgPool::acquire`][crate::PgPool::acquire].
    #[error("attempted to acquire a connection on a closed pool")]
    PoolClosed,
}

impl Error {
    #[inline]
    pub(crate) fn config(message: impl Display) -> Self {
        Error::Configuration(message.to_string().into_boxed_str())
    }

    #[inline]
    pub(crate) fn invalid_operation(message: impl Display) -> Self {
        Error::InvalidOperation(message.to_string().into_boxed_str())
    }
}

impl From<Notice> for Error {
    #[inline]
    fn from(notice: Notice) -> Self {
        Error::Database(Box::new(PgDatabaseError(notice)))
    }
}

/// An error returned from the PostgreSQL backend.
///
/// Wraps the raw `ErrorResponse` message; every field the backend may attach
/// is reachable here. `code` (the SQLSTATE) is the primary discriminator.
pub struct PgDatabaseError(pub(crate) Notice);

impl PgDatabaseError {
    pub fn severity(&self) -> PgSeverity {
        self.0.severity()
    }

    /// The SQLSTATE code for the error.
    pub fn code(&self) -> &str {
        self.0.code()
    }

    /// The primary human-readable error message.
    pub fn message(&self) -> &str {
        self.0.message()
    }

    pub fn detail(&self) -> Option<&str> {
        self.0.get(b'D')
    }

    pub fn hint(&self) -> Option<&str> {
        self.0.get(b'H')
    }

    /// Error cursor position as an index into the original query string,
    /// measured in characters, 1-based.
    pub fn position(&self) -> Option<&str> {
        self.0.get(b'P')
    }

    /// Like `position`, but for an internally generated command.
    pub fn internal_position(&self) -> Option<&str> {
        self.0.get(b'p')
    }

    /// The text of a failed internally-generated command.
    pub fn internal_query(&self) -> Option<&str> {
        self.0.get(b'q')
    }

    /// Call-stack context of where the error occurred.
    pub fn r#where(&self) -> Option<&str> {
        self.0.get(b'W')
    }

    pub fn schema(&self) -> Option<&str> {
        self.0.get(b's')
    }

    pub fn table(&self) -> Option<&str> {
        self.0.get(b't')
    }

    pub fn column(&self) -> Option<&str> {
        self.0.get(b'c')
    }

    pub fn data_type(&self) -> Option<&str> {
        self.0.get(b'd')
    }

    pub fn constraint(&self) -> Option<&str> {
        self.0.get(b'n')
    }

    /// Source-code file name where the error was reported.
    pub fn file(&self) -> Option<&str> {
        self.0.get(b'F')
    }

    /// Source-code line number where the error was reported.
    pub fn line(&self) -> Option<u32> {
        self.0.get(b'L').and_then(|l| l.parse().ok())
    }

    /// Source-code routine name reporting the error.
    pub fn routine(&self) -> Option<&str> {
        self.0.get(b'R')
    }
}

impl Debug for PgDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgDatabaseError")
            .field("severity", &self.severity())
            .field("code", &self.code())
            .field("message", &self.message())
            .field("detail", &self.detail())
            .field("hint", &self.hint())
            .field("position", &self.position())
            .field("where", &self.r#where())
            .field("schema", &self.schema())
            .field("table", &self.table())
            .field("column", &self.column())
            .field("data_type", &self.data_type())
            .field("constraint", &self.constraint())
            .field("file", &self.file())
            .field("line", &self.line())
            .field("routine", &self.routine())
            .finish()
    }
}

impl Display for PgDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.message())
    }
}

impl StdError for PgDatabaseError {}

macro_rules! err_protocol {
    ($($args:tt)*) => {
        $crate::error::Error::Protocol(format!($($args)*).into_boxed_str())
    };
}
