use crate::io::{BufMutExt, Encode};

#[derive(Debug)]
pub(crate) struct Execute<'a> {
    /// The name of the portal to execute (an empty string selects the unnamed portal).
    pub portal: &'a str,

    /// Maximum number of rows to return, if the portal contains a query that
    /// returns rows (ignored otherwise). Zero denotes "no limit".
    pub limit: u32,
}

impl Encode for Execute<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'E');

        buf.put_length_prefixed(|buf| {
            buf.put_str_nul(self.portal);
            buf.extend_from_slice(&self.limit.to_be_bytes());
        });
    }
}

#[test]
fn test_encode_execute() {
    const EXPECTED: &[u8] = b"E\0\0\0\x09\0\0\0\0\0";

    let mut buf = Vec::new();
    let m = Execute {
        portal: "",
        limit: 0,
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}

#[test]
fn test_encode_execute_with_limit() {
    const EXPECTED: &[u8] = b"E\0\0\0\x11cursor_0\0\0\0\0\x02";

    let mut buf = Vec::new();
    let m = Execute {
        portal: "cursor_0",
        limit: 2,
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
