use crate::types::{oid, Oid};

/// An owned, dynamically typed value submitted as an input parameter (or
/// pulled whole out of a row).
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
}

impl PgValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    /// The OID of the type this value encodes as.
    ///
    /// `Null` reports OID zero, which asks the server to infer a type from
    /// the statement.
    pub fn type_oid(&self) -> Oid {
        match self {
            PgValue::Null => Oid(0),
            PgValue::Bool(_) => oid::BOOL,
            PgValue::Int2(_) => oid::INT2,
            PgValue::Int4(_) => oid::INT4,
            PgValue::Int8(_) => oid::INT8,
            PgValue::Float4(_) => oid::FLOAT4,
            PgValue::Float8(_) => oid::FLOAT8,
            PgValue::Text(_) => oid::TEXT,
            PgValue::Bytea(_) => oid::BYTEA,
        }
    }
}

impl From<bool> for PgValue {
    fn from(value: bool) -> Self {
        PgValue::Bool(value)
    }
}

impl From<i16> for PgValue {
    fn from(value: i16) -> Self {
        PgValue::Int2(value)
    }
}

impl From<i32> for PgValue {
    fn from(value: i32) -> Self {
        PgValue::Int4(value)
    }
}

impl From<i64> for PgValue {
    fn from(value: i64) -> Self {
        PgValue::Int8(value)
    }
}

impl From<f32> for PgValue {
    fn from(value: f32) -> Self {
        PgValue::Float4(value)
    }
}

impl From<f64> for PgValue {
    fn from(value: f64) -> Self {
        PgValue::Float8(value)
    }
}

impl From<&str> for PgValue {
    fn from(value: &str) -> Self {
        PgValue::Text(value.to_owned())
    }
}

impl From<String> for PgValue {
    fn from(value: String) -> Self {
        PgValue::Text(value)
    }
}

impl From<&[u8]> for PgValue {
    fn from(value: &[u8]) -> Self {
        PgValue::Bytea(value.to_vec())
    }
}

impl From<Vec<u8>> for PgValue {
    fn from(value: Vec<u8>) -> Self {
        PgValue::Bytea(value)
    }
}

impl<T> From<Option<T>> for PgValue
where
    T: Into<PgValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(PgValue::Null, Into::into)
    }
}
