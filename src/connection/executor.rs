use std::sync::Arc;

use tokio::time::Instant;

use crate::connection::{ConnectorState, PgConnection};
use crate::cursor::PgDataReader;
use crate::error::Error;
use crate::protocol::{
    Bind, Close, CommandComplete, Describe, Execute, Field, Flush, MessageFormat, Parse,
    ParameterDescription, Query, RowDescription, Sync,
};
use crate::statement::{ParameterDirection, PgColumn, Statement};
use crate::types::{Oid, PgValueFormat};

/// A statement parsed server-side under a name, ready to be re-bound.
#[derive(Debug, Clone)]
pub(crate) struct PreparedStatement {
    pub(crate) name: String,
    pub(crate) param_types: Vec<Oid>,
    pub(crate) columns: Option<Arc<[PgColumn]>>,
}

/// How the reader should interpret the response traffic of one statement in
/// a pipeline.
#[derive(Debug)]
pub(crate) struct StatementPlan {
    /// Result shape known up front (prepared statements); an unprepared
    /// statement learns its shape from the in-flight `Describe` reply.
    pub(crate) columns: Option<Arc<[PgColumn]>>,
}

/// Everything needed to put one statement on the wire.
struct EncodedArguments {
    formats: Vec<PgValueFormat>,
    param_types: Vec<Oid>,
    buffer: Vec<u8>,
}

impl PgConnection {
    /// Execute a pipeline of one or more statements and return a reader over
    /// their results.
    ///
    /// All statements go to the backend in a single extended-query flight
    /// (`Parse`/`Bind`/`Describe`/`Execute` per statement, one trailing
    /// `Sync`); their responses come back strictly in statement order
    /// through the returned [`PgDataReader`].
    pub async fn execute(
        &mut self,
        statements: Vec<Statement>,
    ) -> Result<PgDataReader<'_>, Error> {
        // reject caller misuse before a single byte is enqueued
        validate(&statements)?;

        self.wait_until_ready().await?;

        self.state = ConnectorState::Executing;
        self.stream.deadline = self
            .options
            .command_timeout
            .map(|timeout| Instant::now() + timeout);

        let plans = match self.start_pipeline(&statements).await {
            Ok(plans) => plans,

            Err(err) => {
                // the write side is in an unknown partial state
                self.mark_broken();
                return Err(err);
            }
        };

        self.pending_ready_for_query_count += 1;
        self.state = ConnectorState::Fetching;

        Ok(PgDataReader::new(self, statements, plans))
    }

    /// Execute a pipeline and materialize every result eagerly.
    pub async fn execute_collect(
        &mut self,
        statements: Vec<Statement>,
    ) -> Result<Vec<crate::cursor::StatementResult>, Error> {
        let count = statements.len();
        let mut reader = self.execute(statements).await?;

        let mut rows: Vec<Vec<crate::row::PgRow>> = Vec::new();
        rows.resize_with(count, Vec::new);

        loop {
            while let Some(row) = reader.read().await? {
                rows[reader.statement_index()].push(row);
            }

            if !reader.next_result().await? {
                break;
            }
        }

        let statements = reader.close().await?;

        Ok(statements
            .into_iter()
            .zip(rows)
            .map(|(statement, rows)| crate::cursor::StatementResult { statement, rows })
            .collect())
    }

    async fn start_pipeline(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<StatementPlan>, Error> {
        // encode every argument list up front so a bad value cannot leave a
        // half-written pipeline in the buffer
        let mut arguments = Vec::with_capacity(statements.len());

        for statement in statements {
            arguments.push(self.encode_arguments(statement)?);
        }

        let mut plans = Vec::with_capacity(statements.len());

        for (statement, args) in statements.iter().zip(&arguments) {
            let prepared = statement
                .prepared_name
                .as_deref()
                .or_else(|| {
                    self.cache_statement
                        .get(&statement.sql)
                        .map(|ps| ps.name.as_str())
                })
                .map(str::to_owned);

            let plan = match prepared {
                Some(name) => {
                    // already parsed server-side; Bind straight to it
                    let columns = self
                        .cache_statement
                        .get(&statement.sql)
                        .and_then(|ps| ps.columns.clone());

                    self.stream.write(Bind {
                        portal: "",
                        statement: &name,
                        formats: &args.formats,
                        num_params: args.formats.len() as i16,
                        params: &args.buffer,
                        result_formats: &[PgValueFormat::Binary],
                    });

                    StatementPlan { columns }
                }

                None => {
                    self.stream.write(Parse {
                        statement: "",
                        query: &statement.sql,
                        param_types: &args.param_types,
                    });

                    // ask for the result shape; the reply doubles as the
                    // column metadata for the reader
                    self.stream.write(Describe::Statement(""));

                    self.stream.write(Bind {
                        portal: "",
                        statement: "",
                        formats: &args.formats,
                        num_params: args.formats.len() as i16,
                        params: &args.buffer,
                        result_formats: &[PgValueFormat::Binary],
                    });

                    StatementPlan { columns: None }
                }
            };

            self.stream.write(Execute {
                portal: "",
                limit: statement.max_rows,
            });

            plans.push(plan);

            // a long pipeline must not sit in memory: once the buffer passes
            // its soft cap, push it out with a protocol-level Flush so the
            // backend starts answering before the final Sync
            if self.stream.wants_flush() {
                self.stream.write(Flush);
                self.stream.flush().await?;
            }
        }

        self.stream.write(Sync);
        self.stream.flush().await?;

        Ok(plans)
    }

    fn encode_arguments(&self, statement: &Statement) -> Result<EncodedArguments, Error> {
        let registry = &self.options.type_registry;

        let mut formats = Vec::with_capacity(statement.parameters.len());
        let mut param_types = Vec::with_capacity(statement.parameters.len());
        let mut buffer = Vec::new();

        for (index, parameter) in statement.parameters.iter().enumerate() {
            let handler = registry.handler_for_value(&parameter.value);

            // a NULL stays OID zero so the server infers a type
            param_types.push(parameter.value.type_oid());
            formats.push(handler.format());

            handler
                .encode(&parameter.value, &mut buffer)
                .map_err(|source| Error::ParameterEncode {
                    index: index + 1,
                    source,
                })?;
        }

        Ok(EncodedArguments {
            formats,
            param_types,
            buffer,
        })
    }

    /// Parse `statement` under a server-side name so later executions skip
    /// `Parse`/`Describe`. The name and result shape are recorded on the
    /// statement and in this connection's statement cache.
    pub async fn prepare(&mut self, statement: &mut Statement) -> Result<(), Error> {
        validate(std::slice::from_ref(statement))?;

        self.wait_until_ready().await?;

        if let Some(cached) = self.cache_statement.get(&statement.sql) {
            statement.prepared_name = Some(cached.name.clone());
            statement.param_types = Some(cached.param_types.clone());
            statement.columns = cached.columns.clone();
            return Ok(());
        }

        let name = self.next_statement_name();

        let args = self.encode_arguments(statement)?;

        self.state = ConnectorState::Executing;

        self.stream.write(Parse {
            statement: &name,
            query: &statement.sql,
            param_types: &args.param_types,
        });
        self.stream.write(Describe::Statement(&name));
        self.stream.write(Sync);

        self.pending_ready_for_query_count += 1;

        let result = self.finish_prepare(&name, statement).await;

        match result {
            Ok(()) => Ok(()),

            Err(Error::Database(err)) => {
                self.drain_until_ready().await?;
                Err(Error::Database(err))
            }

            Err(err) => {
                self.mark_broken();
                Err(err)
            }
        }
    }

    async fn finish_prepare(
        &mut self,
        name: &str,
        statement: &mut Statement,
    ) -> Result<(), Error> {
        self.stream.flush().await?;

        // the statement is now parsed and semantically valid
        let message = self.stream.recv().await?;

        if message.format != MessageFormat::ParseComplete {
            return Err(err_protocol!(
                "expecting ParseComplete but received {:?}",
                message.format
            ));
        }

        let params: ParameterDescription = self
            .stream
            .recv_expect(MessageFormat::ParameterDescription)
            .await?;

        let columns = match self.stream.recv().await? {
            message if message.format == MessageFormat::RowDescription => {
                let rows: RowDescription = message.decode()?;

                Some(columns_from_fields(rows.fields, PgValueFormat::Binary))
            }

            // nothing would be returned if this statement were executed
            message if message.format == MessageFormat::NoData => None,

            message => {
                return Err(err_protocol!(
                    "expecting RowDescription or NoData but received {:?}",
                    message.format
                ));
            }
        };

        let message = self.stream.recv().await?;

        if message.format != MessageFormat::ReadyForQuery {
            return Err(err_protocol!(
                "expecting ReadyForQuery but received {:?}",
                message.format
            ));
        }

        self.handle_ready_for_query(message)?;
        self.state = ConnectorState::Ready;

        statement.prepared_name = Some(name.to_owned());
        statement.param_types = Some(params.types.clone());
        statement.columns = columns.clone();

        if self.cache_statement.len() < self.options.statement_cache_capacity {
            self.cache_statement.insert(
                statement.sql.clone(),
                PreparedStatement {
                    name: name.to_owned(),
                    param_types: params.types,
                    columns,
                },
            );
        }

        Ok(())
    }

    /// Release a prepared statement on the backend.
    pub async fn unprepare(&mut self, statement: &mut Statement) -> Result<(), Error> {
        let name = match statement.prepared_name.take() {
            Some(name) => name,
            None => {
                return Err(Error::invalid_operation(
                    "the statement has not been prepared",
                ));
            }
        };

        self.wait_until_ready().await?;
        self.state = ConnectorState::Executing;

        self.stream.write(Close::Statement(&name));
        self.stream.write(Sync);
        self.pending_ready_for_query_count += 1;

        let result: Result<(), Error> = async {
            self.stream.flush().await?;

            loop {
                let message = self.stream.recv().await?;

                match message.format {
                    MessageFormat::CloseComplete => {}

                    MessageFormat::ReadyForQuery => {
                        self.handle_ready_for_query(message)?;
                        break;
                    }

                    format => {
                        return Err(err_protocol!(
                            "unprepare: unexpected message: {:?}",
                            format
                        ));
                    }
                }
            }

            Ok(())
        }
        .await;

        self.cache_statement.retain(|_, ps| ps.name != name);

        match result {
            Ok(()) => {
                self.state = ConnectorState::Ready;
                Ok(())
            }

            Err(Error::Database(err)) => {
                self.drain_until_ready().await?;
                Err(Error::Database(err))
            }

            Err(err) => {
                self.mark_broken();
                Err(err)
            }
        }
    }

    /// Run `sql` through the simple-query protocol, discarding any rows, and
    /// return the rows-affected count of the last statement in it.
    pub async fn execute_simple(&mut self, sql: &str) -> Result<u64, Error> {
        self.wait_until_ready().await?;

        self.state = ConnectorState::Executing;
        self.stream.write(Query(sql));
        self.pending_ready_for_query_count += 1;

        let result: Result<u64, Error> = async {
            self.stream.flush().await?;

            let mut rows_affected = 0;

            loop {
                let message = self.stream.recv().await?;

                match message.format {
                    MessageFormat::CommandComplete => {
                        rows_affected = message.decode::<CommandComplete>()?.rows_affected();
                    }

                    MessageFormat::RowDescription
                    | MessageFormat::DataRow
                    | MessageFormat::EmptyQueryResponse => {
                        // row data over the simple protocol is not surfaced here
                    }

                    MessageFormat::ReadyForQuery => {
                        self.handle_ready_for_query(message)?;
                        break;
                    }

                    format => {
                        return Err(err_protocol!(
                            "execute_simple: unexpected message: {:?}",
                            format
                        ));
                    }
                }
            }

            Ok(rows_affected)
        }
        .await;

        match result {
            Ok(rows) => {
                self.state = ConnectorState::Ready;
                Ok(rows)
            }

            Err(Error::Database(err)) => {
                self.drain_until_ready().await?;
                Err(Error::Database(err))
            }

            Err(err) => {
                self.mark_broken();
                Err(err)
            }
        }
    }

    /// Return the session to its login defaults, so settings such as
    /// `SET search_path` cannot leak to the next borrower of a pooled
    /// connection. Cheap and idempotent.
    pub async fn reset(&mut self) -> Result<(), Error> {
        if self.options.no_reset_on_close {
            return Ok(());
        }

        self.execute_simple("DISCARD ALL").await?;

        // DISCARD ALL deallocates server-side prepared statements
        self.cache_statement.clear();

        Ok(())
    }

    fn next_statement_name(&mut self) -> String {
        let id = self.next_statement_id;
        self.next_statement_id = self.next_statement_id.wrapping_add(1);

        let mut buf = itoa::Buffer::new();
        let mut name = String::with_capacity(16);
        name.push_str("_pg_s_");
        name.push_str(buf.format(id));

        name
    }
}

fn validate(statements: &[Statement]) -> Result<(), Error> {
    for statement in statements {
        for parameter in &statement.parameters {
            if parameter.direction != ParameterDirection::Input {
                return Err(Error::invalid_operation(
                    "only Input-direction parameters may be submitted for execution",
                ));
            }
        }
    }

    Ok(())
}

pub(crate) fn columns_from_fields(
    fields: Vec<Field>,
    format: PgValueFormat,
) -> Arc<[PgColumn]> {
    fields
        .into_iter()
        .enumerate()
        .map(|(ordinal, field)| PgColumn {
            ordinal,
            name: field.name,
            type_oid: field.type_oid,
            format,
        })
        .collect()
}
