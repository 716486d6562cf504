use std::sync::Arc;

use crate::connection::{columns_from_fields, ConnectorState, PgConnection, StatementPlan};
use crate::error::Error;
use crate::protocol::{
    CommandComplete, DataRow, MessageFormat, ParameterDescription, RowDescription,
};
use crate::row::PgRow;
use crate::statement::{PgColumn, Statement, StatementType};
use crate::types::PgValueFormat;

/// A forward-only cursor over the results of an executed pipeline.
///
/// Results arrive strictly in statement order. [`read`][Self::read] walks
/// the rows of the current result; [`next_result`][Self::next_result] skips
/// whatever remains of it and positions at the next statement's rows.
/// Dropping the reader without [`close`][Self::close] leaves the unread tail
/// on the socket; the connection drains it before its next command.
#[derive(Debug)]
pub struct PgDataReader<'c> {
    conn: &'c mut PgConnection,
    statements: Vec<Statement>,
    plans: Vec<StatementPlan>,

    /// Index of the statement whose responses are being consumed.
    current: usize,

    /// Columns of the currently open result set.
    columns: Option<Arc<[PgColumn]>>,

    /// The current result has delivered its end (command tag); reads return
    /// nothing until `next_result`.
    result_closed: bool,

    /// The pipeline's `ReadyForQuery` has been consumed.
    complete: bool,
}

enum Step {
    /// Bookkeeping message; nothing observable happened.
    Continue,

    /// A result set opened (its columns are now known).
    NewResult,

    Row(DataRow),

    /// The current statement delivered its completion.
    StatementEnd,

    /// The pipeline is fully consumed.
    Done,
}

impl<'c> PgDataReader<'c> {
    pub(crate) fn new(
        conn: &'c mut PgConnection,
        statements: Vec<Statement>,
        plans: Vec<StatementPlan>,
    ) -> Self {
        PgDataReader {
            conn,
            statements,
            plans,
            current: 0,
            columns: None,
            result_closed: false,
            complete: false,
        }
    }

    /// The statements of this pipeline, with results populated as far as the
    /// reader has progressed.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Index of the statement whose responses are being consumed.
    pub fn statement_index(&self) -> usize {
        self.current
    }

    /// Columns of the currently open result set.
    pub fn columns(&self) -> &[PgColumn] {
        self.columns.as_deref().unwrap_or(&[])
    }

    /// Fetch the next row of the current result, or `None` once the current
    /// result has ended.
    pub async fn read(&mut self) -> Result<Option<PgRow>, Error> {
        if self.complete || self.result_closed {
            return Ok(None);
        }

        loop {
            match self.step().await? {
                Step::Continue | Step::NewResult => {}

                Step::Row(data) => {
                    let columns = self
                        .columns
                        .clone()
                        .ok_or_else(|| err_protocol!("DataRow outside any result set"))?;

                    return Ok(Some(PgRow { data, columns }));
                }

                Step::StatementEnd => {
                    self.result_closed = true;
                    return Ok(None);
                }

                Step::Done => return Ok(None),
            }
        }
    }

    /// Advance past the rest of the current result to the next statement
    /// that produces rows. `false` once the pipeline is exhausted.
    pub async fn next_result(&mut self) -> Result<bool, Error> {
        if self.complete {
            return Ok(false);
        }

        // drain whatever is left of the current result
        if !self.result_closed {
            loop {
                match self.step().await? {
                    Step::StatementEnd => break,
                    Step::Done => return Ok(false),
                    _ => {}
                }
            }
        }

        self.result_closed = false;

        loop {
            match self.step().await? {
                Step::NewResult => return Ok(true),
                Step::Done => return Ok(false),
                _ => {}
            }
        }
    }

    /// Consume the rest of the pipeline so the connection returns to Ready,
    /// and hand back the statements with their results attached.
    pub async fn close(mut self) -> Result<Vec<Statement>, Error> {
        while !self.complete {
            self.step().await?;
        }

        Ok(self.statements)
    }

    async fn step(&mut self) -> Result<Step, Error> {
        let message = match self.conn.stream.recv().await {
            Ok(message) => message,

            Err(Error::Database(err)) => {
                // the server has skipped the rest of the pipeline; eat
                // everything up to ReadyForQuery so the connection is left
                // Ready, then surface the error
                self.complete = true;
                self.conn.drain_until_ready().await?;

                return Err(Error::Database(err));
            }

            Err(Error::CommandTimedOut) => {
                self.complete = true;
                self.conn.handle_command_timeout().await;

                return Err(Error::CommandTimedOut);
            }

            Err(err) => {
                self.complete = true;
                self.conn.mark_broken();

                return Err(err);
            }
        };

        let statement = self.statements.get_mut(self.current);

        match message.format {
            MessageFormat::ParseComplete
            | MessageFormat::BindComplete
            | MessageFormat::CloseComplete => {
                // for a prepared statement no RowDescription will arrive;
                // its result opens at BindComplete with the shape recorded
                // at prepare time
                if message.format == MessageFormat::BindComplete && self.columns.is_none() {
                    if let Some(columns) =
                        self.plans.get(self.current).and_then(|p| p.columns.clone())
                    {
                        if let Some(statement) = statement {
                            statement.columns = Some(Arc::clone(&columns));
                        }

                        self.columns = Some(columns);
                        return Ok(Step::NewResult);
                    }
                }

                Ok(Step::Continue)
            }

            MessageFormat::ParameterDescription => {
                if let Some(statement) = statement {
                    statement.param_types =
                        Some(message.decode::<ParameterDescription>()?.types);
                }

                Ok(Step::Continue)
            }

            MessageFormat::NoData => Ok(Step::Continue),

            MessageFormat::RowDescription => {
                let rows: RowDescription = message.decode()?;

                // Bind asked for binary results; the format codes in a
                // Describe-statement reply are placeholders
                let columns = columns_from_fields(rows.fields, PgValueFormat::Binary);

                if let Some(statement) = statement {
                    statement.columns = Some(Arc::clone(&columns));
                }

                self.columns = Some(columns);

                Ok(Step::NewResult)
            }

            MessageFormat::DataRow => Ok(Step::Row(message.decode()?)),

            MessageFormat::CommandComplete => {
                let cc: CommandComplete = message.decode()?;

                if let Some(statement) = statement {
                    statement.statement_type = cc.statement_type();
                    statement.rows_affected = cc.rows_affected();
                    statement.inserted_oid = cc.inserted_oid();
                }

                self.finish_statement();

                Ok(Step::StatementEnd)
            }

            MessageFormat::PortalSuspended => {
                // the row budget given in Execute ran out; the portal is
                // abandoned at the next Sync, which ends this result
                if let Some(statement) = statement {
                    statement.statement_type = StatementType::Select;
                }

                self.finish_statement();

                Ok(Step::StatementEnd)
            }

            MessageFormat::EmptyQueryResponse => {
                self.finish_statement();

                Ok(Step::StatementEnd)
            }

            MessageFormat::ReadyForQuery => {
                self.conn.handle_ready_for_query(message)?;
                self.conn.state = ConnectorState::Ready;
                self.conn.stream.deadline = None;
                self.complete = true;

                Ok(Step::Done)
            }

            format => {
                self.complete = true;
                self.conn.mark_broken();

                Err(err_protocol!("unexpected message: {:?}", format))
            }
        }
    }

    fn finish_statement(&mut self) {
        self.current += 1;
        self.columns = None;
    }
}

/// One statement of a completed pipeline together with its materialized
/// rows, as returned by
/// [`PgConnection::execute_collect`][crate::PgConnection::execute_collect].
#[derive(Debug)]
pub struct StatementResult {
    pub statement: Statement,
    pub rows: Vec<PgRow>,
}
