use crate::io::{BufMutExt, Encode};

/// A query submitted through the simple protocol. The backend replies with
/// the full response cycle for every statement in the string and a final
/// `ReadyForQuery`.
#[derive(Debug)]
pub(crate) struct Query<'a>(pub &'a str);

impl Encode for Query<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'Q');

        buf.put_length_prefixed(|buf| {
            buf.put_str_nul(self.0);
        });
    }
}

#[test]
fn test_encode_query() {
    const EXPECTED: &[u8] = b"Q\0\0\0\x10DISCARD ALL\0";

    let mut buf = Vec::new();

    Query("DISCARD ALL").encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
