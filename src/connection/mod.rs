use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Error;
use crate::io::Encode;
use crate::net::connect_tcp;
use crate::options::PgConnectOptions;
use crate::protocol::{
    CancelRequest, Message, MessageFormat, ReadyForQuery, Terminate, TransactionStatus,
};

mod establish;
mod executor;
mod sasl;
mod stream;

pub use stream::NoticeHandler;

pub(crate) use executor::{columns_from_fields, PreparedStatement, StatementPlan};
pub(crate) use stream::PgStream;

/// Lifecycle state of a [`PgConnection`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectorState {
    /// Terminated in an orderly way; the socket is gone.
    Closed,

    /// TCP established, startup handshake in flight.
    Connecting,

    /// Between commands, able to accept a new one.
    Ready,

    /// A pipeline is being written out.
    Executing,

    /// Responses to a pipeline are being consumed.
    Fetching,

    /// An I/O or protocol error made the connection unusable. Terminal.
    Broken,
}

/// A single connection to a PostgreSQL backend.
///
/// A connection serves one caller at a time; exclusive use is what `&mut
/// self` on every operation means. Obtain one directly with
/// [`connect`][Self::connect] or borrow one from a [`PgPool`][crate::PgPool].
pub struct PgConnection {
    pub(crate) stream: PgStream,

    // process id of this backend
    // used to send cancel requests
    process_id: u32,

    // secret key of this backend
    // used to send cancel requests
    secret_key: u32,

    pub(crate) options: PgConnectOptions,

    pub(crate) state: ConnectorState,

    pub(crate) transaction_status: TransactionStatus,

    // sequence of statement ids for use in preparing statements
    pub(crate) next_statement_id: u32,

    // cache of statements prepared on this connection, by query string
    pub(crate) cache_statement: HashMap<String, PreparedStatement>,

    // number of ReadyForQuery messages that we are currently expecting
    pub(crate) pending_ready_for_query_count: usize,
}

impl PgConnection {
    /// Open a new connection described by a `key=value;` connection string.
    pub async fn connect(connection_string: &str) -> Result<Self, Error> {
        let options = connection_string.parse()?;

        Self::connect_with(&options).await
    }

    /// Open a new connection with previously parsed options.
    pub async fn connect_with(options: &PgConnectOptions) -> Result<Self, Error> {
        Self::establish(options).await
    }

    /// The process ID of the backend serving this connection.
    pub fn backend_process_id(&self) -> u32 {
        self.process_id
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// The transaction status reported by the most recent `ReadyForQuery`.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// The backend's reported value for the run-time parameter `name`
    /// (`server_version`, `client_encoding`, …), if it has announced one.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.stream
            .parameter_statuses
            .get(name)
            .map(String::as_str)
    }

    /// Install a callback to receive `NoticeResponse`s. Without one, notices
    /// are logged.
    pub fn set_notice_handler(&mut self, handler: NoticeHandler) {
        self.stream.notice_handler = Some(handler);
    }

    /// Ask the backend to abandon the command currently executing on *this*
    /// connection.
    ///
    /// The request travels on a second, short-lived connection; it is never
    /// written to the connection being cancelled, which may be mid-message.
    pub async fn cancel_query(&self) -> Result<(), Error> {
        use tokio::io::AsyncWriteExt;

        let mut socket = connect_tcp(&self.options.host, self.options.port).await?;

        let mut buf = Vec::with_capacity(16);
        CancelRequest {
            process_id: self.process_id,
            secret_key: self.secret_key,
        }
        .encode(&mut buf);

        socket.write_all(&buf).await?;
        socket.shutdown().await?;

        Ok(())
    }

    /// Gracefully terminate the session.
    pub async fn close(mut self) -> Result<(), Error> {
        // The normal, graceful termination procedure is that the frontend
        // sends a Terminate message and immediately closes the connection.

        self.state = ConnectorState::Closed;
        self.stream.write(Terminate);
        self.stream.flush().await?;
        self.stream.shutdown().await?;

        Ok(())
    }

    #[inline]
    pub(crate) fn mark_broken(&mut self) {
        self.state = ConnectorState::Broken;
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.state == ConnectorState::Broken
    }

    // will return once the connection is ready for another command; any
    // responses left over from an abandoned reader are consumed here
    pub(crate) async fn wait_until_ready(&mut self) -> Result<(), Error> {
        match self.state {
            ConnectorState::Broken => {
                return Err(Error::invalid_operation(
                    "the connection is broken and can no longer be used",
                ));
            }

            ConnectorState::Closed | ConnectorState::Connecting => {
                return Err(Error::invalid_operation("the connection is not open"));
            }

            ConnectorState::Executing => {
                return Err(Error::invalid_operation(
                    "a command is already executing on this connection",
                ));
            }

            ConnectorState::Ready | ConnectorState::Fetching => {}
        }

        // a stale per-command deadline must not bleed into the next command
        self.stream.deadline = None;

        if self.pending_ready_for_query_count > 0 {
            self.drain_until_ready().await?;
        }

        Ok(())
    }

    /// Discard everything up to (and including) the pipeline's final
    /// `ReadyForQuery`, leaving the connection Ready. Skipped messages are
    /// never materialized.
    pub(crate) async fn drain_until_ready(&mut self) -> Result<(), Error> {
        while self.pending_ready_for_query_count > 0 {
            match self
                .stream
                .recv_or_skip(MessageFormat::ReadyForQuery)
                .await
            {
                Ok(Some(message)) => self.handle_ready_for_query(message)?,
                Ok(None) => {}

                Err(err) => {
                    self.mark_broken();
                    return Err(err);
                }
            }
        }

        self.state = ConnectorState::Ready;

        Ok(())
    }

    pub(crate) fn handle_ready_for_query(&mut self, message: Message) -> Result<(), Error> {
        self.pending_ready_for_query_count =
            self.pending_ready_for_query_count.saturating_sub(1);
        self.transaction_status = message.decode::<ReadyForQuery>()?.transaction_status;

        Ok(())
    }

    /// The command deadline has passed: fire a cancel request on a secondary
    /// connection, then give the backend a short grace period to wind the
    /// pipeline down. A backend that stays silent leaves the connection
    /// broken.
    pub(crate) async fn handle_command_timeout(&mut self) {
        if let Err(err) = self.cancel_query().await {
            tracing::debug!("could not deliver cancel request: {err}");
        }

        self.stream.deadline = Some(Instant::now() + Duration::from_secs(2));

        if self.drain_until_ready().await.is_err() {
            self.mark_broken();
        }

        self.stream.deadline = None;
    }
}

impl Debug for PgConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("process_id", &self.process_id)
            .field("state", &self.state)
            .finish()
    }
}
