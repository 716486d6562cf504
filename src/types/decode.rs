use std::fmt::{self, Display, Formatter};
use std::str::from_utf8;

use crate::error::BoxDynError;
use crate::types::{oid, Oid, PgValue, PgValueFormat, TypeRegistry};

/// A reference to a single, possibly NULL, column value plus the metadata
/// needed to decode it.
#[derive(Debug, Copy, Clone)]
pub struct PgValueRef<'r> {
    pub(crate) bytes: Option<&'r [u8]>,
    pub(crate) format: PgValueFormat,
    pub(crate) type_oid: Oid,
}

impl<'r> PgValueRef<'r> {
    #[inline]
    pub fn format(&self) -> PgValueFormat {
        self.format
    }

    #[inline]
    pub fn type_oid(&self) -> Oid {
        self.type_oid
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    fn as_bytes(&self) -> Result<&'r [u8], BoxDynError> {
        self.bytes.ok_or_else(|| UnexpectedNullError.into())
    }

    fn as_str(&self) -> Result<&'r str, BoxDynError> {
        Ok(from_utf8(self.as_bytes()?)?)
    }

    fn ensure_type(&self, accepts: &'static [Oid]) -> Result<(), BoxDynError> {
        if accepts.contains(&self.type_oid) {
            Ok(())
        } else {
            Err(TypeMismatch {
                accepts,
                actual: self.type_oid,
            }
            .into())
        }
    }
}

/// Decoding of a column value into a concrete Rust type; the typed half of
/// the handler interface.
pub trait PgDecode<'r>: Sized {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError>;
}

/// A value that was NULL where the requested type cannot express NULL.
#[derive(Debug)]
pub struct UnexpectedNullError;

impl Display for UnexpectedNullError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("unexpected null; try decoding as an `Option`")
    }
}

impl std::error::Error for UnexpectedNullError {}

/// The column's declared type cannot convert to the requested Rust type.
#[derive(Debug)]
struct TypeMismatch {
    accepts: &'static [Oid],
    actual: Oid,
}

impl Display for TypeMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column has type OID {} which cannot convert to the requested type (accepts {:?})",
            self.actual, self.accepts
        )
    }
}

impl std::error::Error for TypeMismatch {}

macro_rules! decode_numeric {
    ($rust:ty, $($oid:expr),+) => {
        impl PgDecode<'_> for $rust {
            fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
                value.ensure_type(&[$($oid),+])?;

                Ok(match value.format {
                    PgValueFormat::Binary => {
                        <$rust>::from_be_bytes(value.as_bytes()?.try_into()?)
                    }

                    PgValueFormat::Text => value.as_str()?.parse()?,
                })
            }
        }
    };
}

decode_numeric!(i16, oid::INT2);
decode_numeric!(i32, oid::INT4);
decode_numeric!(i64, oid::INT8);
decode_numeric!(f32, oid::FLOAT4);
decode_numeric!(f64, oid::FLOAT8);

impl PgDecode<'_> for bool {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        value.ensure_type(&[oid::BOOL])?;

        Ok(match value.format {
            PgValueFormat::Binary => value.as_bytes()?.first().copied().unwrap_or(0) != 0,
            PgValueFormat::Text => matches!(value.as_bytes()?, b"t" | b"true"),
        })
    }
}

const TEXT_LIKE: &[Oid] = &[oid::TEXT, oid::VARCHAR, oid::BPCHAR, oid::NAME, oid::UNKNOWN];

impl<'r> PgDecode<'r> for &'r str {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        value.ensure_type(TEXT_LIKE)?;

        value.as_str()
    }
}

impl PgDecode<'_> for String {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        <&str as PgDecode>::decode(value).map(ToOwned::to_owned)
    }
}

impl<'r> PgDecode<'r> for &'r [u8] {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        value.ensure_type(&[oid::BYTEA])?;

        match value.format {
            PgValueFormat::Binary => value.as_bytes(),

            PgValueFormat::Text => Err(
                "`&[u8]` cannot borrow from a text-format BYTEA; decode as `Vec<u8>`".into(),
            ),
        }
    }
}

impl PgDecode<'_> for Vec<u8> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        value.ensure_type(&[oid::BYTEA])?;

        match value.format {
            PgValueFormat::Binary => Ok(value.as_bytes()?.to_vec()),
            PgValueFormat::Text => hex_unescape(value.as_bytes()?),
        }
    }
}

impl<'r, T> PgDecode<'r> for Option<T>
where
    T: PgDecode<'r>,
{
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::decode(value).map(Some)
        }
    }
}

/// Dynamic access: decode through the column's registered type handler.
impl PgDecode<'_> for PgValue {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        let bytes = match value.bytes {
            Some(bytes) => bytes,
            None => return Ok(PgValue::Null),
        };

        TypeRegistry::shared()
            .resolve(value.type_oid)
            .decode(value.format, bytes)
    }
}

/// Undo the `\x…` hex escape format of text-mode BYTEA output.
pub(crate) fn hex_unescape(bytes: &[u8]) -> Result<Vec<u8>, BoxDynError> {
    let hex = bytes
        .strip_prefix(b"\\x")
        .ok_or("text-format BYTEA without the \\x prefix is not supported")?;

    if hex.len() % 2 != 0 {
        return Err("odd number of hex digits in BYTEA".into());
    }

    let mut out = Vec::with_capacity(hex.len() / 2);

    for pair in hex.chunks_exact(2) {
        let digits = from_utf8(pair)?;
        out.push(u8::from_str_radix(digits, 16)?);
    }

    Ok(out)
}
