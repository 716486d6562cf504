use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::{BufExt, Decode};

#[derive(Debug)]
pub(crate) enum Authentication {
    /// The authentication exchange is successfully completed.
    Ok,

    /// The frontend must now take part in a Kerberos V5 authentication
    /// dialog with the server. No longer supported by the server; never
    /// supported here.
    KerberosV5,

    /// The frontend must now send a `PasswordMessage` containing the
    /// password in clear-text form.
    CleartextPassword,

    /// The frontend must now send a `PasswordMessage` containing the
    /// password (with user name) encrypted via MD5, then encrypted again
    /// using the 4-byte random salt specified in this message.
    Md5Password(AuthenticationMd5Password),

    /// This response is only possible for local Unix-domain connections on
    /// platforms that support SCM credential messages.
    ScmCredential,

    /// The frontend must now initiate a GSSAPI negotiation.
    Gss,

    /// This message contains the response data from the previous step of
    /// GSSAPI or SSPI negotiation.
    GssContinue,

    /// The frontend must now initiate an SSPI negotiation.
    Sspi,

    /// The frontend must now initiate a SASL negotiation, using one of the
    /// SASL mechanisms listed in the message.
    Sasl(AuthenticationSasl),

    /// This message contains challenge data from the previous step of SASL
    /// negotiation.
    SaslContinue(AuthenticationSaslContinue),

    /// SASL authentication has completed with additional mechanism-specific
    /// data for the client.
    SaslFinal(Bytes),
}

impl Decode for Authentication {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 4 {
            return Err(err_protocol!("authentication message too short"));
        }

        Ok(match buf.get_u32() {
            0 => Authentication::Ok,
            2 => Authentication::KerberosV5,
            3 => Authentication::CleartextPassword,

            5 => {
                let mut salt = [0_u8; 4];

                if buf.remaining() < 4 {
                    return Err(err_protocol!("expected 4-byte salt in authentication message"));
                }

                buf.copy_to_slice(&mut salt);

                Authentication::Md5Password(AuthenticationMd5Password { salt })
            }

            6 => Authentication::ScmCredential,
            7 => Authentication::Gss,
            8 => Authentication::GssContinue,
            9 => Authentication::Sspi,

            10 => {
                let mut mechanisms = Vec::new();

                while buf.first().copied().unwrap_or(0) != 0 {
                    mechanisms.push(buf.get_str_nul()?);
                }

                Authentication::Sasl(AuthenticationSasl { mechanisms })
            }

            11 => Authentication::SaslContinue(AuthenticationSaslContinue::decode(buf)?),

            12 => Authentication::SaslFinal(buf),

            ty => {
                return Err(err_protocol!("unknown authentication message type: {}", ty));
            }
        })
    }
}

#[derive(Debug)]
pub(crate) struct AuthenticationMd5Password {
    pub salt: [u8; 4],
}

#[derive(Debug)]
pub(crate) struct AuthenticationSasl {
    pub mechanisms: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct AuthenticationSaslContinue {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub nonce: String,
    /// The whole `server-first-message`, needed verbatim for the
    /// `AuthMessage` the proof is computed over.
    pub message: String,
}

impl Decode for AuthenticationSaslContinue {
    fn decode(buf: Bytes) -> Result<Self, Error> {
        let mut salt = Vec::new();
        let mut nonce = String::new();
        let mut iterations: u32 = 4096;

        let message = std::str::from_utf8(&buf)
            .map_err(|_| err_protocol!("server-first-message is not valid UTF-8"))?
            .to_owned();

        // the server-first-message is a sequence of comma-separated
        // `attribute=value` pairs
        for part in message.split(',') {
            let (attr, value) = match part.split_once('=') {
                Some(pair) => pair,
                None => continue,
            };

            match attr {
                "s" => {
                    salt = BASE64.decode(value).map_err(|_| {
                        err_protocol!("salt in server-first-message is not valid base64")
                    })?;
                }

                "r" => {
                    nonce = value.to_owned();
                }

                "i" => {
                    iterations = value.parse().map_err(|_| {
                        err_protocol!("iteration count in server-first-message is not an integer")
                    })?;
                }

                _ => {}
            }
        }

        Ok(Self {
            salt,
            iterations,
            nonce,
            message,
        })
    }
}
