use crate::io::Encode;

/// Closes the current extended-query pipeline. The backend answers with
/// `ReadyForQuery` once every preceding message has been processed (or
/// skipped, after an error).
#[derive(Debug)]
pub(crate) struct Sync;

impl Encode for Sync {
    #[inline]
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'S');
        buf.extend_from_slice(&4_i32.to_be_bytes());
    }
}

#[test]
fn test_encode_sync() {
    let mut buf = Vec::new();

    Sync.encode(&mut buf);

    assert_eq!(buf, b"S\0\0\0\x04");
}
