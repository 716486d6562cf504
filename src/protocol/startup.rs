use crate::io::{BufMutExt, Encode};

// The protocol version number. The most significant 16 bits are the major
// version number (3 for the protocol described here). The least significant
// 16 bits are the minor version number (0 for the protocol described here).
const PROTOCOL_VERSION: i32 = 196608;

/// The first message sent on a new connection (no type byte).
///
/// Besides `user` and `database`, any run-time parameter the backend accepts
/// at startup may be forwarded as a key/value pair.
#[derive(Debug)]
pub(crate) struct Startup<'a> {
    pub username: Option<&'a str>,
    pub database: Option<&'a str>,
    pub params: &'a [(&'a str, &'a str)],
}

impl Encode for Startup<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(120);

        buf.put_length_prefixed(|buf| {
            buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());

            if let Some(username) = self.username {
                encode_startup_param(buf, "user", username);
            }

            if let Some(database) = self.database {
                encode_startup_param(buf, "database", database);
            }

            for (name, value) in self.params {
                encode_startup_param(buf, name, value);
            }

            // a zero byte is required as a terminator after the last name/value pair
            buf.push(0);
        });
    }
}

#[inline]
fn encode_startup_param(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.put_str_nul(name);
    buf.put_str_nul(value);
}

#[test]
fn test_encode_startup() {
    const EXPECTED: &[u8] = b"\x00\x00\x00\x17\x00\x03\x00\x00user\0postgres\0\0";

    let mut buf = Vec::new();
    let m = Startup {
        username: Some("postgres"),
        database: None,
        params: &[],
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}

#[test]
fn test_encode_startup_with_params() {
    const EXPECTED: &[u8] =
        b"\x00\x00\x00\x32\x00\x03\x00\x00user\0ferris\0database\0crates\0TimeZone\0UTC\0\0";

    let mut buf = Vec::new();
    let m = Startup {
        username: Some("ferris"),
        database: Some("crates"),
        params: &[("TimeZone", "UTC")],
    };

    m.encode(&mut buf);

    assert_eq!(buf, EXPECTED);
}
