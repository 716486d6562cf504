use std::collections::HashMap;

use crate::connection::{sasl, ConnectorState, PgConnection, PgStream};
use crate::error::Error;
use crate::options::{PgConnectOptions, PgSslMode};
use crate::protocol::{
    Authentication, BackendKeyData, MessageFormat, Password, ReadyForQuery, SslRequest, Startup,
};

// https://www.postgresql.org/docs/current/protocol-flow.html#id-1.10.5.7.3

impl PgConnection {
    pub(crate) async fn establish(options: &PgConnectOptions) -> Result<Self, Error> {
        let mut stream = PgStream::connect(options).await?;

        if options.ssl_mode == PgSslMode::Prefer {
            request_ssl(&mut stream).await?;
        }

        // To begin a session, a frontend opens a connection to the server
        // and sends a startup message.

        let mut params = vec![
            // Sets the display format for date and time values,
            // as well as the rules for interpreting ambiguous date input values.
            ("DateStyle", "ISO, MDY"),
            // Sets the client-side encoding (character set).
            ("client_encoding", "UTF8"),
            // Sets the time zone for displaying and interpreting time stamps.
            ("TimeZone", "UTC"),
        ];

        if let Some(ref application_name) = options.application_name {
            params.push(("application_name", application_name));
        }

        if let Some(ref search_path) = options.search_path {
            params.push(("search_path", search_path));
        }

        stream
            .send(Startup {
                username: Some(&options.username),
                database: options.database.as_deref(),
                params: &params,
            })
            .await?;

        // The server then uses this information and the contents of its
        // configuration files (such as pg_hba.conf) to determine whether the
        // connection is provisionally acceptable, and what additional
        // authentication is required (if any).

        let mut process_id = 0;
        let mut secret_key = 0;
        let transaction_status;

        loop {
            let message = match stream.recv().await {
                Ok(message) => message,

                // the backend reports a failed handshake through an ordinary
                // ErrorResponse; class 28 is "Invalid Authorization
                // Specification"
                Err(Error::Database(err)) if err.code().starts_with("28") => {
                    return Err(Error::Authentication(err.message().into()));
                }

                Err(err) => return Err(err),
            };

            match message.format {
                MessageFormat::Authentication => match message.decode()? {
                    Authentication::Ok => {
                        // the authentication exchange is successfully completed;
                        // nothing more is required to continue
                    }

                    Authentication::CleartextPassword => {
                        // the frontend must now send a PasswordMessage
                        // containing the password in clear-text form
                        stream
                            .send(Password::Cleartext(
                                options.password.as_deref().unwrap_or_default(),
                            ))
                            .await?;
                    }

                    Authentication::Md5Password(body) => {
                        // the frontend must now send a PasswordMessage
                        // containing the password (with user name) encrypted
                        // via MD5, then encrypted again using the 4-byte
                        // random salt specified in the request
                        stream
                            .send(Password::Md5 {
                                username: &options.username,
                                password: options.password.as_deref().unwrap_or_default(),
                                salt: body.salt,
                            })
                            .await?;
                    }

                    Authentication::Sasl(body) => {
                        sasl::authenticate(&mut stream, options, body).await?;
                    }

                    method => {
                        return Err(Error::Authentication(
                            format!("unsupported authentication method: {method:?}")
                                .into_boxed_str(),
                        ));
                    }
                },

                MessageFormat::BackendKeyData => {
                    // provides secret-key data that the frontend must save
                    // to be able to issue cancel requests later
                    let data: BackendKeyData = message.decode()?;

                    process_id = data.process_id;
                    secret_key = data.secret_key;
                }

                MessageFormat::ReadyForQuery => {
                    // start-up is complete; the frontend can now issue commands
                    transaction_status =
                        message.decode::<ReadyForQuery>()?.transaction_status;

                    break;
                }

                format => {
                    return Err(err_protocol!("establish: unexpected message: {:?}", format));
                }
            }
        }

        tracing::debug!(
            host = %options.host,
            port = options.port,
            process_id,
            "connection established"
        );

        Ok(PgConnection {
            stream,
            process_id,
            secret_key,
            options: options.clone(),
            state: ConnectorState::Ready,
            transaction_status,
            next_statement_id: 1,
            cache_statement: HashMap::new(),
            pending_ready_for_query_count: 0,
        })
    }
}

/// Probe for TLS with `SslRequest`. The backend answers with a single byte.
///
/// This build carries no TLS stack; a backend that accepts the probe (or one
/// old enough to answer with an `ErrorResponse`) fails the connection.
async fn request_ssl(stream: &mut PgStream) -> Result<(), Error> {
    stream.send(SslRequest).await?;

    match stream.read_raw(1).await?.first().copied() {
        Some(b'N') => Ok(()),

        Some(b'S') => Err(err_protocol!(
            "server accepted the TLS probe but TLS support is not enabled in this build"
        )),

        byte => Err(err_protocol!(
            "unexpected reply to SSLRequest: {:?}",
            byte
        )),
    }
}
