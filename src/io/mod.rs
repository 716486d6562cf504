mod buf;
mod buf_mut;
mod buffered;

pub(crate) use buf::BufExt;
pub(crate) use buf_mut::BufMutExt;
pub(crate) use buffered::BufferedStream;

use bytes::Bytes;

use crate::error::Error;

/// Serialization of a single frontend message into the write buffer.
pub(crate) trait Encode {
    fn encode(&self, buf: &mut Vec<u8>);
}

/// Deserialization of a single backend message body.
///
/// The 5-byte header has already been consumed; `buf` is exactly the message
/// contents.
pub(crate) trait Decode: Sized {
    fn decode(buf: Bytes) -> Result<Self, Error>;
}
