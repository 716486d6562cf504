//! The mapping between PostgreSQL types and Rust values.
//!
//! Input parameters travel as [`PgValue`]s; each variant is tied to a
//! built-in type OID through a [`TypeHandler`] looked up in the
//! [`TypeRegistry`]. Column data comes back through the same handlers (for
//! dynamic access) or through [`PgDecode`] (for typed access).

mod decode;
mod handler;
mod value;

pub use decode::{PgDecode, PgValueRef};
pub use handler::{TypeHandler, TypeRegistry};
pub use value::PgValue;

use std::fmt::{self, Display, Formatter};

/// PostgreSQL's 32-bit object identifier, here used to name data types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Oid(pub u32);

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Type OIDs of the built-in types this crate ships handlers for, as found
/// in `pg_type.dat`.
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const UNKNOWN: Oid = Oid(705);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
}

/// The format a value travels in on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(i16)]
pub enum PgValueFormat {
    Text = 0,
    Binary = 1,
}

impl PgValueFormat {
    pub(crate) fn try_from_i16(value: i16) -> Result<Self, crate::error::Error> {
        match value {
            0 => Ok(PgValueFormat::Text),
            1 => Ok(PgValueFormat::Binary),

            _ => Err(err_protocol!("unknown format code: {}", value)),
        }
    }
}
