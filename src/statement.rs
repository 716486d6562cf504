use std::sync::Arc;

use crate::types::{Oid, PgValue, PgValueFormat};

/// The declared direction of a [`PgParameter`].
///
/// Only `Input` parameters may be submitted for execution; the other
/// directions exist for the command layer above and are rejected here.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ParameterDirection {
    Input,
    Output,
    InputOutput,
}

/// One parameter of a [`Statement`].
#[derive(Debug, Clone)]
pub struct PgParameter {
    pub value: PgValue,
    pub direction: ParameterDirection,

    /// Used only by name-to-positional preprocessors layered above this
    /// crate; execution is purely positional.
    pub name: Option<String>,
}

impl PgParameter {
    pub fn input(value: impl Into<PgValue>) -> Self {
        PgParameter {
            value: value.into(),
            direction: ParameterDirection::Input,
            name: None,
        }
    }
}

/// The kind of SQL statement, as reported by the first word of the backend's
/// `CommandComplete` tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Begin,
    Commit,
    Rollback,
    Copy,
    Move,
    Fetch,

    /// Everything else (DDL and the rest of the utility commands).
    #[default]
    Other,
}

impl StatementType {
    pub(crate) fn from_tag_word(word: &str) -> Self {
        match word {
            "SELECT" => StatementType::Select,
            "INSERT" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "BEGIN" => StatementType::Begin,
            "COMMIT" => StatementType::Commit,
            "ROLLBACK" => StatementType::Rollback,
            "COPY" => StatementType::Copy,
            "MOVE" => StatementType::Move,
            "FETCH" => StatementType::Fetch,
            _ => StatementType::Other,
        }
    }
}

/// Metadata for one column of a result set.
#[derive(Debug, Clone)]
pub struct PgColumn {
    pub(crate) ordinal: usize,
    pub(crate) name: String,
    pub(crate) type_oid: Oid,
    pub(crate) format: PgValueFormat,
}

impl PgColumn {
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_oid(&self) -> Oid {
        self.type_oid
    }

    pub fn format(&self) -> PgValueFormat {
        self.format
    }
}

/// One SQL statement with positional placeholders (`$1`, `$2`, …), its input
/// parameters, and, after execution, its results.
///
/// `Clone` produces a deep, independent copy; nothing is shared with the
/// original beyond the (immutable) column metadata.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) sql: String,
    pub(crate) parameters: Vec<PgParameter>,

    /// Maximum number of rows the backend may return; zero means no limit.
    /// A limited statement whose row budget runs out ends its result set
    /// with `PortalSuspended` instead of a command tag.
    pub(crate) max_rows: u32,

    // results, populated as the pipeline completes
    pub(crate) statement_type: StatementType,
    pub(crate) rows_affected: u64,
    pub(crate) inserted_oid: Oid,
    pub(crate) columns: Option<Arc<[PgColumn]>>,

    /// Parameter types as the backend described them, once known.
    pub(crate) param_types: Option<Vec<Oid>>,

    // set when prepared server-side
    pub(crate) prepared_name: Option<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            parameters: Vec::new(),
            max_rows: 0,
            statement_type: StatementType::Other,
            rows_affected: 0,
            inserted_oid: Oid(0),
            columns: None,
            param_types: None,
            prepared_name: None,
        }
    }

    /// Append an input parameter for the next positional placeholder.
    pub fn bind(mut self, value: impl Into<PgValue>) -> Self {
        self.parameters.push(PgParameter::input(value));
        self
    }

    /// Append a fully specified parameter.
    pub fn bind_param(mut self, parameter: PgParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Cap the number of rows the backend returns for this statement.
    pub fn max_rows(mut self, limit: u32) -> Self {
        self.max_rows = limit;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[PgParameter] {
        &self.parameters
    }

    /// The kind of statement, known once it has completed.
    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    /// Rows affected (or returned), known once the statement has completed.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// OID of a single inserted row, for `INSERT` into a table with OIDs;
    /// zero otherwise.
    pub fn inserted_oid(&self) -> Oid {
        self.inserted_oid
    }

    /// Column metadata, present once executed if the statement returns rows.
    pub fn columns(&self) -> Option<&[PgColumn]> {
        self.columns.as_deref()
    }

    /// Parameter types as described by the backend, once known.
    pub fn param_types(&self) -> Option<&[Oid]> {
        self.param_types.as_deref()
    }

    /// The server-side name, if this statement has been prepared.
    pub fn prepared_name(&self) -> Option<&str> {
        self.prepared_name.as_deref()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared_name.is_some()
    }
}
