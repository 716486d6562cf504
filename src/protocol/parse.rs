use crate::io::{BufMutExt, Encode};
use crate::types::Oid;

#[derive(Debug)]
pub(crate) struct Parse<'a> {
    /// The name of the destination prepared statement (an empty string
    /// selects the unnamed statement).
    pub statement: &'a str,

    /// The query string to be parsed.
    pub query: &'a str,

    /// The parameter data types specified (could be zero). Note that this is not an
    /// indication of the number of parameters that might appear in the query string,
    /// only the number that the frontend wants to pre-specify types for.
    ///
    /// An OID of zero asks the server to infer the type.
    pub param_types: &'a [Oid],
}

impl Encode for Parse<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'P');

        buf.put_length_prefixed(|buf| {
            buf.put_str_nul(self.statement);
            buf.put_str_nul(self.query);

            debug_assert!(self.param_types.len() <= (i16::MAX as usize));

            buf.extend_from_slice(&(self.param_types.len() as i16).to_be_bytes());

            for ty in self.param_types {
                buf.extend_from_slice(&ty.0.to_be_bytes());
            }
        });
    }
}

#[test]
fn test_encode_parse() {
    const EXPECTED: &[u8] = b"P\0\0\0\x15\0SELECT $1\0\0\x01\0\0\0\x19";

    let mut buf = Vec::new();
    let m = Parse {
        statement: "",
        query: "SELECT $1",
        param_types: &[Oid(25)],
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
