use bytes::Bytes;

use crate::error::Error;
use crate::io::{BufExt, Decode};

/// Reports the current setting of a backend parameter the server considers
/// interesting (`server_version`, `client_encoding`, `TimeZone`, …). Sent
/// during startup and again whenever such a parameter changes.
#[derive(Debug)]
pub(crate) struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl Decode for ParameterStatus {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        let name = buf.get_str_nul()?;
        let value = buf.get_str_nul()?;

        Ok(Self { name, value })
    }
}

#[test]
fn test_decode_parameter_status() {
    const DATA: &[u8] = b"client_encoding\x00UTF8\x00";

    let m = ParameterStatus::decode(DATA.into()).unwrap();

    assert_eq!(&m.name, "client_encoding");
    assert_eq!(&m.value, "UTF8");
}

#[test]
fn test_decode_empty_parameter_status() {
    const DATA: &[u8] = b"\x00\x00";

    let m = ParameterStatus::decode(DATA.into()).unwrap();

    assert!(m.name.is_empty());
    assert!(m.value.is_empty());
}
