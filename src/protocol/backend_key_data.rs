use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::Decode;

/// Cancellation key data. The frontend must save these values if it wishes
/// to be able to issue `CancelRequest` messages later.
#[derive(Debug)]
pub(crate) struct BackendKeyData {
    /// The process ID of this backend.
    pub process_id: u32,

    /// The secret key of this backend.
    pub secret_key: u32,
}

impl Decode for BackendKeyData {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 8 {
            return Err(err_protocol!("BackendKeyData message too short"));
        }

        let process_id = buf.get_u32();
        let secret_key = buf.get_u32();

        Ok(Self {
            process_id,
            secret_key,
        })
    }
}

#[test]
fn it_decodes_backend_key_data() {
    const DATA: &[u8] = b"\0\0'\xc6\x89R\xc5+";

    let m = BackendKeyData::decode(DATA.into()).unwrap();

    assert_eq!(m.process_id, 10182);
    assert_eq!(m.secret_key, 2303903019);
}
