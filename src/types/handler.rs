use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::BoxDynError;
use crate::types::{oid, Oid, PgValue, PgValueFormat};

/// Encodes parameter values into the Bind value section and decodes raw
/// column data back into [`PgValue`]s, for one type OID.
///
/// Implementations are registered in a [`TypeRegistry`]; the registry is
/// consulted by the Bind encoder (format and length come from the handler)
/// and by dynamic row access (handler chosen by the column's type OID).
pub trait TypeHandler: Send + Sync + 'static {
    /// The type OID this handler services.
    fn oid(&self) -> Oid;

    /// The wire format this handler reads and writes.
    fn format(&self) -> PgValueFormat {
        PgValueFormat::Binary
    }

    /// Validate `value` and write it as one Bind parameter: a big-endian
    /// `Int32` byte length followed by the value bytes (`-1` and no bytes
    /// for NULL).
    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError>;

    /// Decode one column's raw bytes into a dynamic value.
    fn decode(&self, format: PgValueFormat, bytes: &[u8]) -> Result<PgValue, BoxDynError>;
}

/// The value was not of the variant a handler services.
#[derive(Debug)]
pub(crate) struct ValueKindMismatch {
    expected: &'static str,
}

impl Display for ValueKindMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "value is not {}", self.expected)
    }
}

impl std::error::Error for ValueKindMismatch {}

#[inline]
fn encode_value(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

#[inline]
fn encode_null(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(-1_i32).to_be_bytes());
}

macro_rules! numeric_handler {
    ($name:ident, $oid:expr, $variant:ident, $rust:ty, $expected:literal) => {
        struct $name;

        impl TypeHandler for $name {
            fn oid(&self) -> Oid {
                $oid
            }

            fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError> {
                match value {
                    PgValue::Null => encode_null(buf),
                    PgValue::$variant(v) => encode_value(buf, &v.to_be_bytes()),

                    _ => return Err(ValueKindMismatch { expected: $expected }.into()),
                }

                Ok(())
            }

            fn decode(
                &self,
                format: PgValueFormat,
                bytes: &[u8],
            ) -> Result<PgValue, BoxDynError> {
                Ok(PgValue::$variant(match format {
                    PgValueFormat::Binary => <$rust>::from_be_bytes(bytes.try_into()?),
                    PgValueFormat::Text => std::str::from_utf8(bytes)?.parse()?,
                }))
            }
        }
    };
}

numeric_handler!(Int2Handler, oid::INT2, Int2, i16, "a 2-byte integer");
numeric_handler!(Int4Handler, oid::INT4, Int4, i32, "a 4-byte integer");
numeric_handler!(Int8Handler, oid::INT8, Int8, i64, "an 8-byte integer");
numeric_handler!(Float4Handler, oid::FLOAT4, Float4, f32, "a 4-byte float");
numeric_handler!(Float8Handler, oid::FLOAT8, Float8, f64, "an 8-byte float");

struct BoolHandler;

impl TypeHandler for BoolHandler {
    fn oid(&self) -> Oid {
        oid::BOOL
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError> {
        match value {
            PgValue::Null => encode_null(buf),
            PgValue::Bool(v) => encode_value(buf, &[*v as u8]),

            _ => return Err(ValueKindMismatch { expected: "a boolean" }.into()),
        }

        Ok(())
    }

    fn decode(&self, format: PgValueFormat, bytes: &[u8]) -> Result<PgValue, BoxDynError> {
        Ok(PgValue::Bool(match format {
            PgValueFormat::Binary => bytes.first().copied().unwrap_or(0) != 0,
            PgValueFormat::Text => matches!(bytes, b"t" | b"true"),
        }))
    }
}

struct TextHandler;

impl TypeHandler for TextHandler {
    fn oid(&self) -> Oid {
        oid::TEXT
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError> {
        match value {
            PgValue::Null => encode_null(buf),
            PgValue::Text(v) => encode_value(buf, v.as_bytes()),

            _ => return Err(ValueKindMismatch { expected: "a string" }.into()),
        }

        Ok(())
    }

    fn decode(&self, _format: PgValueFormat, bytes: &[u8]) -> Result<PgValue, BoxDynError> {
        // text and binary representations coincide for text types
        Ok(PgValue::Text(std::str::from_utf8(bytes)?.to_owned()))
    }
}

struct ByteaHandler;

impl TypeHandler for ByteaHandler {
    fn oid(&self) -> Oid {
        oid::BYTEA
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError> {
        match value {
            PgValue::Null => encode_null(buf),
            PgValue::Bytea(v) => encode_value(buf, v),

            _ => return Err(ValueKindMismatch { expected: "a byte array" }.into()),
        }

        Ok(())
    }

    fn decode(&self, format: PgValueFormat, bytes: &[u8]) -> Result<PgValue, BoxDynError> {
        Ok(PgValue::Bytea(match format {
            PgValueFormat::Binary => bytes.to_vec(),
            PgValueFormat::Text => super::decode::hex_unescape(bytes)?,
        }))
    }
}

/// The fallback for OIDs with no registered handler: surface the raw bytes
/// as text.
struct UnknownHandler;

impl TypeHandler for UnknownHandler {
    fn oid(&self) -> Oid {
        oid::UNKNOWN
    }

    fn format(&self) -> PgValueFormat {
        PgValueFormat::Text
    }

    fn encode(&self, value: &PgValue, buf: &mut Vec<u8>) -> Result<(), BoxDynError> {
        match value {
            PgValue::Null => encode_null(buf),
            PgValue::Text(v) => encode_value(buf, v.as_bytes()),

            _ => return Err(ValueKindMismatch { expected: "a string" }.into()),
        }

        Ok(())
    }

    fn decode(&self, _format: PgValueFormat, bytes: &[u8]) -> Result<PgValue, BoxDynError> {
        Ok(PgValue::Text(
            String::from_utf8_lossy(bytes).into_owned(),
        ))
    }
}

static UNKNOWN: UnknownHandler = UnknownHandler;

/// Maps type OIDs to their handlers.
pub struct TypeRegistry {
    handlers: HashMap<u32, Arc<dyn TypeHandler>>,
}

static DEFAULT: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::new()));

impl TypeRegistry {
    /// A registry holding the built-in handlers.
    pub fn new() -> Self {
        let mut registry = TypeRegistry {
            handlers: HashMap::new(),
        };

        registry.register(Arc::new(BoolHandler));
        registry.register(Arc::new(Int2Handler));
        registry.register(Arc::new(Int4Handler));
        registry.register(Arc::new(Int8Handler));
        registry.register(Arc::new(Float4Handler));
        registry.register(Arc::new(Float8Handler));
        registry.register(Arc::new(TextHandler));
        registry.register(Arc::new(ByteaHandler));

        registry
    }

    /// The registry every connection uses unless configured otherwise.
    pub fn shared() -> Arc<TypeRegistry> {
        Arc::clone(&DEFAULT)
    }

    /// Register `handler` for its OID, replacing any previous registration.
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        self.handlers.insert(handler.oid().0, handler);
    }

    /// The handler for `oid`, falling back to the raw-text handler for OIDs
    /// nothing was registered for.
    pub fn handler_for(&self, oid: Oid) -> &dyn TypeHandler {
        self.handlers
            .get(&oid.0)
            .map_or(&UNKNOWN as &dyn TypeHandler, |handler| &**handler)
    }

    /// The handler a parameter value encodes through.
    pub fn handler_for_value(&self, value: &PgValue) -> &dyn TypeHandler {
        self.handler_for(value.type_oid())
    }

    /// Shorthand: a few text types share the text handler's representation.
    pub(crate) fn resolve(&self, oid: Oid) -> &dyn TypeHandler {
        match oid {
            oid::VARCHAR | oid::BPCHAR | oid::NAME => self.handler_for(oid::TEXT),
            _ => self.handler_for(oid),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut oids: Vec<u32> = self.handlers.keys().copied().collect();
        oids.sort_unstable();

        f.debug_struct("TypeRegistry").field("oids", &oids).finish()
    }
}
