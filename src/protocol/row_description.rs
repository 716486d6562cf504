use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::{BufExt, Decode};
use crate::types::{Oid, PgValueFormat};

/// Column metadata preceding a result's data rows.
#[derive(Debug)]
pub(crate) struct RowDescription {
    pub fields: Vec<Field>,
}

#[derive(Debug)]
pub(crate) struct Field {
    /// The field name.
    pub name: String,

    /// If the field can be identified as a column of a specific table, the
    /// object ID of the table; otherwise zero.
    pub table_oid: u32,

    /// If the field can be identified as a column of a specific table, the
    /// attribute number of the column; otherwise zero.
    pub column_id: i16,

    /// The object ID of the field's data type.
    pub type_oid: Oid,

    /// The data type size (see `pg_type.typlen`). Note that negative values
    /// denote variable-width types.
    pub type_size: i16,

    /// The type modifier (see `pg_attribute.atttypmod`).
    pub type_modifier: i32,

    /// The format code being used for the field.
    ///
    /// Currently will be text or binary. In a `RowDescription` returned from
    /// the statement variant of `Describe`, the format code is not yet known
    /// and will always be text.
    pub format: PgValueFormat,
}

impl Decode for RowDescription {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("RowDescription message too short"));
        }

        let cnt = buf.get_u16() as usize;
        let mut fields = Vec::with_capacity(cnt);

        for _ in 0..cnt {
            let name = buf.get_str_nul()?;

            if buf.remaining() < 18 {
                return Err(err_protocol!("truncated field in RowDescription"));
            }

            fields.push(Field {
                name,
                table_oid: buf.get_u32(),
                column_id: buf.get_i16(),
                type_oid: Oid(buf.get_u32()),
                type_size: buf.get_i16(),
                type_modifier: buf.get_i32(),
                format: PgValueFormat::try_from_i16(buf.get_i16())?,
            });
        }

        Ok(Self { fields })
    }
}
