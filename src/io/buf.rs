use bytes::{Buf, Bytes};
use memchr::memchr;

use crate::error::Error;

pub(crate) trait BufExt: Buf {
    /// Read a NUL-terminated byte sequence, consuming the terminator without
    /// returning it.
    fn get_bytes_nul(&mut self) -> Result<Bytes, Error>;

    /// Read a NUL-terminated UTF-8 string, consuming the terminator. The NUL
    /// must already be present in the buffer.
    fn get_str_nul(&mut self) -> Result<String, Error>;

    /// Read `len` bytes as a UTF-8 string.
    fn get_str(&mut self, len: usize) -> Result<String, Error>;
}

impl BufExt for Bytes {
    fn get_bytes_nul(&mut self) -> Result<Bytes, Error> {
        let nul =
            memchr(b'\0', self).ok_or_else(|| err_protocol!("expected NUL in byte sequence"))?;

        let bytes = self.slice(0..nul);

        self.advance(nul + 1);

        Ok(bytes)
    }

    fn get_str_nul(&mut self) -> Result<String, Error> {
        self.get_bytes_nul().and_then(|bytes| {
            String::from_utf8(bytes.to_vec())
                .map_err(|err| err_protocol!("{}", err))
        })
    }

    fn get_str(&mut self, len: usize) -> Result<String, Error> {
        if self.remaining() < len {
            return Err(err_protocol!(
                "expected {} bytes in buffer but only {} remain",
                len,
                self.remaining()
            ));
        }

        let bytes = self.slice(0..len);

        self.advance(len);

        String::from_utf8(bytes.to_vec()).map_err(|err| err_protocol!("{}", err))
    }
}
