use std::sync::Arc;

use crate::error::Error;
use crate::protocol::DataRow;
use crate::statement::PgColumn;
use crate::types::{PgDecode, PgValue, PgValueRef};

/// A single row of a result set.
///
/// The row retains the raw `DataRow` body; columns decode lazily, on access.
#[derive(Debug)]
pub struct PgRow {
    pub(crate) data: DataRow,
    pub(crate) columns: Arc<[PgColumn]>,
}

impl PgRow {
    /// The number of columns in the row.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[PgColumn] {
        &self.columns
    }

    /// The ordinal of the column named `name`, if any.
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name == name)
    }

    /// Decode the column at `index` into `T` through its type handler.
    pub fn try_get<'r, T>(&'r self, index: usize) -> Result<T, Error>
    where
        T: PgDecode<'r>,
    {
        let column = self
            .columns
            .get(index)
            .filter(|_| index < self.data.len())
            .ok_or(Error::ColumnIndexOutOfBounds {
                index,
                len: self.data.len(),
            })?;

        let value = PgValueRef {
            bytes: self.data.get(index),
            format: column.format,
            type_oid: column.type_oid,
        };

        T::decode(value).map_err(|source| Error::ColumnDecode { index, source })
    }

    /// Decode the column at `index`, panicking on failure.
    ///
    /// Prefer [`try_get`][Self::try_get] anywhere an unexpected NULL or a
    /// type mismatch is not a programming error.
    #[track_caller]
    pub fn get<'r, T>(&'r self, index: usize) -> T
    where
        T: PgDecode<'r>,
    {
        match self.try_get(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// The column at `index` as a dynamically typed value.
    pub fn value(&self, index: usize) -> Result<PgValue, Error> {
        self.try_get(index)
    }
}
