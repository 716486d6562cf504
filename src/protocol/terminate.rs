use crate::io::Encode;

/// The orderly goodbye: after sending this the frontend simply closes the
/// socket.
#[derive(Debug)]
pub(crate) struct Terminate;

impl Encode for Terminate {
    #[inline]
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'X');
        buf.extend_from_slice(&4_i32.to_be_bytes());
    }
}

#[test]
fn test_encode_terminate() {
    let mut buf = Vec::new();

    Terminate.encode(&mut buf);

    assert_eq!(buf, b"X\0\0\0\x04");
}
