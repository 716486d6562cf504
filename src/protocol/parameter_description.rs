use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::Decode;
use crate::types::Oid;

/// Describes the parameters a prepared statement needs, one type OID per
/// `$n` placeholder.
#[derive(Debug)]
pub(crate) struct ParameterDescription {
    pub types: Vec<Oid>,
}

impl Decode for ParameterDescription {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("ParameterDescription message too short"));
        }

        let cnt = buf.get_u16() as usize;

        if buf.remaining() < cnt * 4 {
            return Err(err_protocol!(
                "ParameterDescription declares {} parameters but carries {} bytes",
                cnt,
                buf.remaining()
            ));
        }

        let mut types = Vec::with_capacity(cnt);

        for _ in 0..cnt {
            types.push(Oid(buf.get_u32()));
        }

        Ok(Self { types })
    }
}

#[test]
fn it_decodes_parameter_description() {
    const DATA: &[u8] = b"\x00\x02\x00\x00\x00\x00\x00\x00\x05\x00";

    let m = ParameterDescription::decode(DATA.into()).unwrap();

    assert_eq!(m.types.len(), 2);
    assert_eq!(m.types[0], Oid(0x0000_0000));
    assert_eq!(m.types[1], Oid(0x0000_0500));
}

#[test]
fn it_decodes_empty_parameter_description() {
    const DATA: &[u8] = b"\x00\x00";

    let m = ParameterDescription::decode(DATA.into()).unwrap();

    assert!(m.types.is_empty());
}
