use std::fmt::Write;

use md5::{Digest, Md5};

use crate::io::{BufMutExt, Encode};

#[derive(Debug)]
pub(crate) enum Password<'a> {
    Cleartext(&'a str),

    Md5 {
        password: &'a str,
        username: &'a str,
        salt: [u8; 4],
    },
}

impl Encode for Password<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(b'p');

        buf.put_length_prefixed(|buf| match self {
            Password::Cleartext(password) => {
                buf.put_str_nul(password);
            }

            Password::Md5 {
                password,
                username,
                salt,
            } => {
                // The actual `PasswordMessage` can be computed in SQL as
                // `concat('md5', md5(concat(md5(concat(password, username)), random-salt)))`.

                // Keep in mind the md5() function returns its result as a hex string.

                let mut hasher = Md5::new();

                hasher.update(password);
                hasher.update(username);

                let credentials = hex(&hasher.finalize_reset());

                hasher.update(&credentials);
                hasher.update(salt);

                let salted = hex(&hasher.finalize());

                buf.extend_from_slice(b"md5");
                buf.put_str_nul(&salted);
            }
        });
    }
}

fn hex(digest: &[u8]) -> String {
    let mut s = String::with_capacity(digest.len() * 2);

    for b in digest {
        // unwrap: writing to a string cannot fail
        write!(s, "{:02x}", b).unwrap();
    }

    s
}
