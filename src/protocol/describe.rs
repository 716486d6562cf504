use crate::io::{BufMutExt, Encode};

const DESCRIBE_PORTAL: u8 = b'P';
const DESCRIBE_STATEMENT: u8 = b'S';

/// Ask the backend to describe a prepared statement (parameter types +
/// row shape) or a portal (row shape only).
#[derive(Debug)]
#[allow(dead_code)]
pub(crate) enum Describe<'a> {
    Statement(&'a str),
    Portal(&'a str),
}

impl Encode for Describe<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'D');

        buf.put_length_prefixed(|buf| match self {
            Describe::Statement(name) => {
                buf.push(DESCRIBE_STATEMENT);
                buf.put_str_nul(name);
            }

            Describe::Portal(name) => {
                buf.push(DESCRIBE_PORTAL);
                buf.put_str_nul(name);
            }
        });
    }
}

#[test]
fn test_encode_describe_unnamed_statement() {
    const EXPECTED: &[u8] = b"D\0\0\0\x06S\0";

    let mut buf = Vec::new();

    Describe::Statement("").encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}

#[test]
fn test_encode_describe_portal() {
    const EXPECTED: &[u8] = b"D\0\0\0\x0ePcursor_0\0";

    let mut buf = Vec::new();

    Describe::Portal("cursor_0").encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
