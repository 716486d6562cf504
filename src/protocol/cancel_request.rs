use crate::io::Encode;

/// Sent instead of [`Startup`][super::Startup] on a new connection to cancel
/// a query running on an existing connection. Never sent on the connection
/// being cancelled.
#[derive(Debug)]
pub(crate) struct CancelRequest {
    /// The process ID of the target backend, from `BackendKeyData`.
    pub process_id: u32,

    /// The secret key for the target backend, from `BackendKeyData`.
    pub secret_key: u32,
}

// chosen to contain 1234 in the most significant 16 bits, and 5678 in the
// least significant 16 bits; must not match any protocol version number
const CANCEL_REQUEST_CODE: u32 = (1234 << 16) | 5678;

impl Encode for CancelRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&16_u32.to_be_bytes());
        buf.extend_from_slice(&CANCEL_REQUEST_CODE.to_be_bytes());
        buf.extend_from_slice(&self.process_id.to_be_bytes());
        buf.extend_from_slice(&self.secret_key.to_be_bytes());
    }
}

#[test]
fn test_encode_cancel_request() {
    const EXPECTED: &[u8] =
        b"\x00\x00\x00\x10\x04\xd2\x16\x2e\x00\x00\x27\xc6\x89\x52\xc5\x2b";

    let mut buf = Vec::new();
    let m = CancelRequest {
        process_id: 10182,
        secret_key: 2303903019,
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
