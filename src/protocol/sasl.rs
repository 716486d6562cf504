use crate::io::{BufMutExt, Encode};

/// The client's opening move of a SASL negotiation: the selected mechanism
/// and, for SCRAM, the `client-first-message`.
#[derive(Debug)]
pub(crate) struct SaslInitialResponse<'a> {
    pub mechanism: &'a str,
    pub response: &'a str,
}

impl Encode for SaslInitialResponse<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'p');

        buf.put_length_prefixed(|buf| {
            buf.put_str_nul(self.mechanism);
            buf.extend_from_slice(&(self.response.len() as i32).to_be_bytes());
            buf.extend_from_slice(self.response.as_bytes());
        });
    }
}

/// Mechanism-specific continuation data (for SCRAM, the
/// `client-final-message`).
#[derive(Debug)]
pub(crate) struct SaslResponse<'a>(pub &'a str);

impl Encode for SaslResponse<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'p');

        buf.put_length_prefixed(|buf| {
            buf.extend_from_slice(self.0.as_bytes());
        });
    }
}

#[test]
fn test_encode_sasl_initial_response() {
    const EXPECTED: &[u8] = b"p\0\0\0\x1aSCRAM-SHA-256\0\x00\x00\x00\x04n,,,";

    let mut buf = Vec::new();
    let m = SaslInitialResponse {
        mechanism: "SCRAM-SHA-256",
        response: "n,,,",
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}

#[test]
fn test_encode_sasl_response() {
    const EXPECTED: &[u8] = b"p\0\0\0\x07abc";

    let mut buf = Vec::new();

    SaslResponse("abc").encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
