use crate::io::Encode;

/// Probe for TLS support, sent before [`Startup`][super::Startup]. The
/// backend answers with a single byte: `S` to proceed with a TLS handshake,
/// `N` to continue in plaintext.
#[derive(Debug)]
pub(crate) struct SslRequest;

// 1234 in the most significant 16 bits, 5679 in the least significant 16 bits
const SSL_REQUEST_CODE: u32 = (1234 << 16) | 5679;

impl Encode for SslRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        // packet length: 8 bytes including self
        buf.extend_from_slice(&8_u32.to_be_bytes());
        buf.extend_from_slice(&SSL_REQUEST_CODE.to_be_bytes());
    }
}

#[test]
fn test_encode_ssl_request() {
    let mut buf = Vec::new();

    SslRequest.encode(&mut buf);

    assert_eq!(buf, b"\x00\x00\x00\x08\x04\xd2\x16\x2f");
}
