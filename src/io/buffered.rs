use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::io::Encode;

// Tokio, async-std, and std all use this as the default capacity for their buffered I/O.
const DEFAULT_BUF_SIZE: usize = 8192;

/// A socket wrapped in paired read/write buffers that understand the
/// protocol's framing.
///
/// Request bytes are fully enqueued into the [`WriteBuffer`] before response
/// reading begins; the two buffers are never driven in parallel within one
/// message boundary.
pub(crate) struct BufferedStream<S> {
    socket: S,
    write_buf: WriteBuffer,
    read_buf: ReadBuffer,
}

/// The outbound buffer.
///
/// `bytes_flushed..bytes_written` is the unsent region; a send that stops
/// short (the socket was not ready for the full slice) advances
/// `bytes_flushed` only, and the next flush resumes from the first unsent
/// byte. Once everything has been sent both cursors reset to zero.
pub(crate) struct WriteBuffer {
    buf: Vec<u8>,
    bytes_written: usize,
    bytes_flushed: usize,
}

/// The inbound buffer: `read` holds decodable bytes, `available` is spare
/// capacity the socket reads into. Oversized messages grow `available`
/// instead of failing.
struct ReadBuffer {
    read: BytesMut,
    available: BytesMut,
}

impl<S> BufferedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(socket: S) -> Self {
        BufferedStream {
            socket,
            write_buf: WriteBuffer {
                buf: Vec::with_capacity(DEFAULT_BUF_SIZE),
                bytes_written: 0,
                bytes_flushed: 0,
            },
            read_buf: ReadBuffer {
                read: BytesMut::new(),
                available: BytesMut::with_capacity(DEFAULT_BUF_SIZE),
            },
        }
    }

    /// Enqueue one frontend message.
    #[inline]
    pub fn write<T: Encode>(&mut self, message: T) {
        message.encode(self.write_buf.buf_mut());
        self.write_buf.bytes_written = self.write_buf.buf.len();
        self.write_buf.sanity_check();
    }

    /// `true` once the unsent region has passed the soft cap and the caller
    /// should flush before enqueueing more of a pipeline.
    #[inline]
    pub fn wants_flush(&self) -> bool {
        self.write_buf.bytes_written - self.write_buf.bytes_flushed >= DEFAULT_BUF_SIZE
    }

    /// Drive the unsent region to the socket until none remains.
    pub async fn flush(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            let written = self.socket.write(self.write_buf.get()).await?;

            if written == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }

            self.write_buf.consume(written);
            self.write_buf.sanity_check();
        }

        self.socket.flush().await?;

        Ok(())
    }

    /// Return exactly `len` decodable bytes, pulling from the socket as
    /// needed. Fails with `UnexpectedEof` if the peer closes first.
    pub async fn read_buffered(&mut self, len: usize) -> Result<BytesMut, Error> {
        self.read_buf.fill(len, &mut self.socket).await?;

        Ok(self.read_buf.read.split_to(len))
    }

    /// Discard the next `len` bytes, reading from the socket as needed.
    pub async fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.read_buf.fill(len, &mut self.socket).await?;

        let _ = self.read_buf.read.split_to(len);

        Ok(())
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.socket.shutdown().await
    }

    #[cfg(test)]
    pub fn write_buffer(&self) -> &WriteBuffer {
        &self.write_buf
    }
}

impl WriteBuffer {
    fn sanity_check(&self) {
        assert!(self.bytes_written <= self.buf.len());
        assert!(self.bytes_flushed <= self.bytes_written);
    }

    fn buf_mut(&mut self) -> &mut Vec<u8> {
        self.buf.truncate(self.bytes_written);
        self.sanity_check();
        &mut self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.bytes_flushed >= self.bytes_written
    }

    /// The unsent region.
    fn get(&self) -> &[u8] {
        &self.buf[self.bytes_flushed..self.bytes_written]
    }

    fn consume(&mut self, amt: usize) {
        let new_bytes_flushed = self
            .bytes_flushed
            .checked_add(amt)
            .expect("self.bytes_flushed + amt overflowed");

        assert!(new_bytes_flushed <= self.bytes_written);

        self.bytes_flushed = new_bytes_flushed;

        if self.bytes_flushed == self.bytes_written {
            // the whole buffer went out; reset the cursors so the
            // allocation is reused from the start
            self.bytes_flushed = 0;
            self.bytes_written = 0;
            self.buf.truncate(0);
        }

        self.sanity_check();
    }

    #[cfg(test)]
    pub fn bytes_pending(&self) -> usize {
        self.bytes_written - self.bytes_flushed
    }
}

impl ReadBuffer {
    /// Because of how `BytesMut` works, we should only be shifting capacity
    /// back and forth between `read` and `available` unless we have to read
    /// an oversize message.
    async fn fill<S>(&mut self, len: usize, socket: &mut S) -> Result<(), Error>
    where
        S: AsyncRead + Unpin,
    {
        while self.read.len() < len {
            self.reserve(len - self.read.len());

            let n = socket.read_buf(&mut self.available).await?;

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "expected to read {} bytes, got {} bytes at EOF",
                        len,
                        self.read.len()
                    ),
                )
                .into());
            }

            self.advance(n);
        }

        Ok(())
    }

    fn reserve(&mut self, amt: usize) {
        if let Some(additional) = amt.checked_sub(self.available.capacity()) {
            self.available.reserve(additional);
        }
    }

    fn advance(&mut self, amt: usize) {
        self.read.unsplit(self.available.split_to(amt));
    }
}
