use std::str::from_utf8;

use bytes::Bytes;
use memchr::memchr;

use crate::error::Error;
use crate::io::Decode;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum PgSeverity {
    Panic,
    Fatal,
    Error,
    Warning,
    Notice,
    Debug,
    Info,
    Log,
}

impl PgSeverity {
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Panic | Self::Fatal | Self::Error)
    }
}

impl TryFrom<&str> for PgSeverity {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "PANIC" => PgSeverity::Panic,
            "FATAL" => PgSeverity::Fatal,
            "ERROR" => PgSeverity::Error,
            "WARNING" => PgSeverity::Warning,
            "NOTICE" => PgSeverity::Notice,
            "DEBUG" => PgSeverity::Debug,
            "INFO" => PgSeverity::Info,
            "LOG" => PgSeverity::Log,

            severity => {
                return Err(err_protocol!("unknown severity: {:?}", severity));
            }
        })
    }
}

/// The shared body of `ErrorResponse` and `NoticeResponse`: a sequence of
/// `{field code, value}` pairs.
///
/// The raw message is retained; the three always-present fields are cached
/// as ranges at decode time and everything else is found on demand.
#[derive(Debug)]
pub struct Notice {
    storage: Bytes,
    severity: PgSeverity,
    message: (u16, u16),
    code: (u16, u16),
}

impl Notice {
    #[inline]
    pub fn severity(&self) -> PgSeverity {
        self.severity
    }

    /// The SQLSTATE code.
    #[inline]
    pub fn code(&self) -> &str {
        self.get_cached_str(self.code)
    }

    /// The primary human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        self.get_cached_str(self.message)
    }

    // Field descriptions available here:
    //  https://www.postgresql.org/docs/current/protocol-error-fields.html

    #[inline]
    pub fn get(&self, ty: u8) -> Option<&str> {
        self.get_raw(ty).and_then(|v| from_utf8(v).ok())
    }

    pub fn get_raw(&self, ty: u8) -> Option<&[u8]> {
        self.fields()
            .filter(|(field, _)| *field == ty)
            .map(|(_, (start, end))| &self.storage[start as usize..end as usize])
            .next()
    }

    #[inline]
    fn fields(&self) -> Fields<'_> {
        Fields {
            storage: &self.storage,
            offset: 0,
        }
    }

    #[inline]
    fn get_cached_str(&self, cache: (u16, u16)) -> &str {
        // unwrap: the ranges were validated as UTF-8 at decode time
        from_utf8(&self.storage[cache.0 as usize..cache.1 as usize]).unwrap()
    }
}

impl Decode for Notice {
    fn decode(buf: Bytes) -> Result<Self, Error> {
        // In order to support PostgreSQL 9.5 and older we need to parse the localized S
        // field. Newer versions additionally come with the V field that is guaranteed to
        // be in English. We thus read both versions and prefer the unlocalized one.
        let mut severity_v = None;
        let mut severity_s = None;
        let mut message = (0, 0);
        let mut code = (0, 0);

        let fields = Fields {
            storage: &buf,
            offset: 0,
        };

        for (field, v) in fields {
            if message.0 != 0 && code.0 != 0 && severity_v.is_some() {
                // stop iterating as soon as we have the fields we cache
                break;
            }

            match field {
                b'S' => {
                    // severity (S): this field, unlike V, may be localized
                    severity_s = from_utf8(&buf[v.0 as usize..v.1 as usize])
                        .ok()
                        .and_then(|s| PgSeverity::try_from(s).ok());
                }

                b'V' => {
                    // severity (V): non-localized, always present in 9.6+
                    severity_v = Some(PgSeverity::try_from(
                        from_utf8(&buf[v.0 as usize..v.1 as usize])
                            .map_err(|err| err_protocol!("{}", err))?,
                    )?);
                }

                b'M' => {
                    from_utf8(&buf[v.0 as usize..v.1 as usize])
                        .map_err(|err| err_protocol!("{}", err))?;

                    message = v;
                }

                b'C' => {
                    from_utf8(&buf[v.0 as usize..v.1 as usize])
                        .map_err(|err| err_protocol!("{}", err))?;

                    code = v;
                }

                _ => {}
            }
        }

        Ok(Self {
            severity: severity_v.or(severity_s).unwrap_or(PgSeverity::Log),
            message,
            code,
            storage: buf,
        })
    }
}

/// An iterator over each field in an Error (or Notice) response.
struct Fields<'a> {
    storage: &'a [u8],
    offset: u16,
}

impl<'a> Iterator for Fields<'a> {
    type Item = (u8, (u16, u16));

    fn next(&mut self) -> Option<Self::Item> {
        // The fields in the response body are sequentially stored as [tag][string],
        // ending in a final, additional [nul]

        let ty = *self.storage.get(self.offset as usize)?;

        if ty == 0 {
            return None;
        }

        let nul = memchr(b'\0', &self.storage[(self.offset + 1) as usize..])? as u16;
        let offset = self.offset;

        self.offset += nul + 2;

        Some((ty, (offset + 1, offset + nul + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTICE_RESPONSE: &[u8] = b"SNOTICE\0VNOTICE\0C42710\0Mextension \"uuid-ossp\" already exists, skipping\0Fextension.c\0L1656\0RCreateExtension\0\0";

    #[test]
    fn it_decodes_notice_response() {
        let m = Notice::decode(Bytes::from_static(NOTICE_RESPONSE)).unwrap();

        assert_eq!(m.severity(), PgSeverity::Notice);
        assert_eq!(m.code(), "42710");
        assert_eq!(
            m.message(),
            "extension \"uuid-ossp\" already exists, skipping"
        );
        assert_eq!(m.get(b'F'), Some("extension.c"));
        assert_eq!(m.get(b'L'), Some("1656"));
        assert_eq!(m.get(b'R'), Some("CreateExtension"));
        assert_eq!(m.get(b'H'), None);
    }

    #[test]
    fn it_decodes_error_response_without_v_field() {
        const DATA: &[u8] = b"SFATAL\0C28P01\0Mpassword authentication failed\0\0";

        let m = Notice::decode(Bytes::from_static(DATA)).unwrap();

        assert_eq!(m.severity(), PgSeverity::Fatal);
        assert_eq!(m.code(), "28P01");
    }
}
