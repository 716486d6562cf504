use std::collections::BTreeMap;
use std::future::Future;

use bytes::Buf;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::error::Error;
use crate::io::{BufferedStream, Decode, Encode};
use crate::net::connect_tcp;
use crate::options::PgConnectOptions;
use crate::protocol::{Message, MessageFormat, Notice, ParameterStatus, PgSeverity};

/// Callback invoked for every `NoticeResponse` the backend sends.
pub type NoticeHandler = Box<dyn Fn(Notice) + Send + Sync>;

// the stream is a separate type from the connection to uphold the invariant
// that an instantiated [PgConnection] is a *valid* connection to the backend

// while a new connection is being established, we work directly on the
// [PgStream]

pub(crate) struct PgStream {
    inner: BufferedStream<TcpStream>,

    /// Deadline applied to every socket operation while a command is in
    /// flight.
    pub(crate) deadline: Option<Instant>,

    pub(crate) notice_handler: Option<NoticeHandler>,

    /// The backend's reported parameter settings, updated as
    /// `ParameterStatus` messages arrive.
    pub(crate) parameter_statuses: BTreeMap<String, String>,
}

impl PgStream {
    pub(crate) async fn connect(options: &PgConnectOptions) -> Result<Self, Error> {
        let socket = connect_tcp(&options.host, options.port).await?;

        Ok(Self {
            inner: BufferedStream::new(socket),
            deadline: None,
            notice_handler: None,
            parameter_statuses: BTreeMap::new(),
        })
    }

    /// Enqueue a message; nothing is sent until [`flush`][Self::flush].
    #[inline]
    pub(crate) fn write<T: Encode>(&mut self, message: T) {
        self.inner.write(message);
    }

    /// `true` once enough is buffered that a pipelined writer should flush
    /// before enqueueing more.
    #[inline]
    pub(crate) fn wants_flush(&self) -> bool {
        self.inner.wants_flush()
    }

    pub(crate) async fn flush(&mut self) -> Result<(), Error> {
        let deadline = self.deadline;
        with_deadline(deadline, async { Ok(self.inner.flush().await?) }).await
    }

    pub(crate) async fn send<T: Encode>(&mut self, message: T) -> Result<(), Error> {
        self.write(message);
        self.flush().await
    }

    /// Read exactly `len` raw bytes, bypassing message framing. Used only
    /// for the single-byte reply to `SslRequest`.
    pub(crate) async fn read_raw(&mut self, len: usize) -> Result<bytes::BytesMut, Error> {
        let deadline = self.deadline;
        with_deadline(deadline, self.inner.read_buffered(len)).await
    }

    /// Read the next message frame without routing asynchronous traffic;
    /// `ErrorResponse` comes back as an ordinary message.
    pub(crate) async fn recv_unchecked(&mut self) -> Result<Message, Error> {
        let deadline = self.deadline;

        with_deadline(deadline, async {
            // all packets after startup begin with a 5-byte header containing
            // the message type and the length of the rest of the message
            let mut header = self.inner.read_buffered(5).await?.freeze();

            let format = MessageFormat::try_from_u8(header.get_u8())?;
            let size = header.get_u32() as usize;

            if size < 4 {
                return Err(err_protocol!("malformed message length: {}", size));
            }

            let contents = self.inner.read_buffered(size - 4).await?.freeze();

            Ok(Message { format, contents })
        })
        .await
    }

    /// Read the next frame, discarding its body unless it is a `want`
    /// message. Used to drain an abandoned pipeline without materializing
    /// row data.
    pub(crate) async fn recv_or_skip(
        &mut self,
        want: MessageFormat,
    ) -> Result<Option<Message>, Error> {
        let deadline = self.deadline;

        with_deadline(deadline, async {
            let mut header = self.inner.read_buffered(5).await?.freeze();

            let format = MessageFormat::try_from_u8(header.get_u8())?;
            let size = header.get_u32() as usize;

            if size < 4 {
                return Err(err_protocol!("malformed message length: {}", size));
            }

            if format == want {
                let contents = self.inner.read_buffered(size - 4).await?.freeze();

                Ok(Some(Message { format, contents }))
            } else {
                self.inner.skip(size - 4).await?;

                Ok(None)
            }
        })
        .await
    }

    /// Get the next message from the backend, routing the asynchronous
    /// traffic (`NoticeResponse`, `ParameterStatus`, notifications) that may
    /// arrive at any point; an `ErrorResponse` is raised as
    /// [`Error::Database`].
    pub(crate) async fn recv(&mut self) -> Result<Message, Error> {
        loop {
            let message = self.recv_unchecked().await?;

            match message.format {
                MessageFormat::ErrorResponse => {
                    // an error returned from the database server
                    let notice: Notice = message.decode()?;

                    return Err(notice.into());
                }

                MessageFormat::NoticeResponse => {
                    let notice: Notice = message.decode()?;

                    match &self.notice_handler {
                        Some(handler) => handler(notice),
                        None => log_notice(&notice),
                    }

                    continue;
                }

                MessageFormat::ParameterStatus => {
                    // informs the frontend about the current (initial)
                    // setting of a backend parameter
                    let ParameterStatus { name, value } = message.decode()?;

                    self.parameter_statuses.insert(name, value);

                    continue;
                }

                MessageFormat::NotificationResponse => {
                    // LISTEN/NOTIFY delivery is out of scope; drop it on the
                    // floor rather than derail the protocol flow
                    tracing::trace!("ignoring NotificationResponse");

                    continue;
                }

                _ => {}
            }

            return Ok(message);
        }
    }

    /// Receive a message, expecting a specific type.
    pub(crate) async fn recv_expect<T: Decode>(
        &mut self,
        format: MessageFormat,
    ) -> Result<T, Error> {
        let message = self.recv().await?;

        if message.format != format {
            return Err(err_protocol!(
                "expecting {:?} but received {:?}",
                format,
                message.format
            ));
        }

        message.decode()
    }

    pub(crate) async fn shutdown(&mut self) -> Result<(), Error> {
        Ok(self.inner.shutdown().await?)
    }
}

fn log_notice(notice: &Notice) {
    let message = notice.message();
    let code = notice.code();

    match notice.severity() {
        PgSeverity::Panic | PgSeverity::Fatal | PgSeverity::Error => {
            tracing::error!(target: "pgclient::notice", code, "{message}");
        }
        PgSeverity::Warning => tracing::warn!(target: "pgclient::notice", code, "{message}"),
        PgSeverity::Notice | PgSeverity::Info => {
            tracing::info!(target: "pgclient::notice", code, "{message}");
        }
        PgSeverity::Debug | PgSeverity::Log => {
            tracing::debug!(target: "pgclient::notice", code, "{message}");
        }
    }
}

async fn with_deadline<T, F>(deadline: Option<Instant>, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::CommandTimedOut)?,

        None => fut.await,
    }
}
