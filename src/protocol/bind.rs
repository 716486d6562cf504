use crate::io::{BufMutExt, Encode};
use crate::types::PgValueFormat;

pub(crate) struct Bind<'a> {
    /// The name of the destination portal (an empty string selects the unnamed portal).
    pub portal: &'a str,

    /// The name of the source prepared statement (an empty string selects the
    /// unnamed statement).
    pub statement: &'a str,

    /// The parameter format codes. Each must presently be zero (text) or one (binary).
    ///
    /// There can be zero to indicate that there are no parameters or that the parameters all use the
    /// default format (text); or one, in which case the specified format code is applied to all
    /// parameters; or it can equal the actual number of parameters.
    pub formats: &'a [PgValueFormat],

    pub num_params: i16,

    /// The value of each parameter, pre-encoded as `[Int32 length][bytes]`
    /// (length −1 indicates NULL).
    pub params: &'a [u8],

    /// The result-column format codes. Each must presently be zero (text) or one (binary).
    ///
    /// There can be zero to indicate that there are no result columns or that the
    /// result columns should all use the default format (text); or one, in which
    /// case the specified format code is applied to all result columns (if any);
    /// or it can equal the actual number of result columns of the query.
    pub result_formats: &'a [PgValueFormat],
}

impl Encode for Bind<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'B');

        buf.put_length_prefixed(|buf| {
            buf.put_str_nul(self.portal);
            buf.put_str_nul(self.statement);

            buf.extend_from_slice(&(self.formats.len() as i16).to_be_bytes());

            for &format in self.formats {
                buf.extend_from_slice(&(format as i16).to_be_bytes());
            }

            buf.extend_from_slice(&self.num_params.to_be_bytes());
            buf.extend_from_slice(self.params);

            buf.extend_from_slice(&(self.result_formats.len() as i16).to_be_bytes());

            for &format in self.result_formats {
                buf.extend_from_slice(&(format as i16).to_be_bytes());
            }
        });
    }
}

#[test]
fn test_encode_bind() {
    // unnamed portal, unnamed statement, one binary int4 parameter = 8,
    // all results binary
    const EXPECTED: &[u8] =
        b"B\0\0\0\x18\0\0\0\x01\0\x01\0\x01\0\0\0\x04\0\0\0\x08\0\x01\0\x01";

    let mut buf = Vec::new();
    let m = Bind {
        portal: "",
        statement: "",
        formats: &[PgValueFormat::Binary],
        num_params: 1,
        params: &[0, 0, 0, 4, 0, 0, 0, 8],
        result_formats: &[PgValueFormat::Binary],
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
