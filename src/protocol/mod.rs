//! Serialization of frontend messages and deserialization of backend
//! messages, exactly as the wire protocol (version 3) lays them out.
//!
//! Every backend message after startup carries a 5-byte header: one ASCII
//! type byte, then a big-endian `Int32` length that includes itself but not
//! the type byte. Frontend messages follow the same pattern; `Startup`,
//! `SslRequest` and `CancelRequest` have no type byte.

mod authentication;
mod backend_key_data;
mod bind;
mod cancel_request;
mod close;
mod command_complete;
mod data_row;
mod describe;
mod execute;
mod flush;
mod parameter_description;
mod parameter_status;
mod parse;
mod password;
mod query;
mod ready_for_query;
mod response;
mod row_description;
mod sasl;
mod ssl_request;
mod startup;
mod sync;
mod terminate;

pub(crate) use authentication::{Authentication, AuthenticationSasl};
pub(crate) use backend_key_data::BackendKeyData;
pub(crate) use bind::Bind;
pub(crate) use cancel_request::CancelRequest;
pub(crate) use close::Close;
pub(crate) use command_complete::CommandComplete;
pub(crate) use data_row::DataRow;
pub(crate) use describe::Describe;
pub(crate) use execute::Execute;
pub(crate) use flush::Flush;
pub(crate) use parameter_description::ParameterDescription;
pub(crate) use parameter_status::ParameterStatus;
pub(crate) use parse::Parse;
pub(crate) use password::Password;
pub(crate) use query::Query;
pub(crate) use ready_for_query::ReadyForQuery;
pub use ready_for_query::TransactionStatus;
pub use response::{Notice, PgSeverity};
pub(crate) use row_description::{Field, RowDescription};
pub(crate) use sasl::{SaslInitialResponse, SaslResponse};
pub(crate) use ssl_request::SslRequest;
pub(crate) use startup::Startup;
pub(crate) use sync::Sync;
pub(crate) use terminate::Terminate;

use bytes::Bytes;

use crate::error::Error;
use crate::io::Decode;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum MessageFormat {
    Authentication,
    BackendKeyData,
    BindComplete,
    CloseComplete,
    CommandComplete,
    DataRow,
    EmptyQueryResponse,
    ErrorResponse,
    NoData,
    NoticeResponse,
    NotificationResponse,
    ParameterDescription,
    ParameterStatus,
    ParseComplete,
    PortalSuspended,
    ReadyForQuery,
    RowDescription,
}

impl MessageFormat {
    pub(crate) fn try_from_u8(v: u8) -> Result<Self, Error> {
        Ok(match v {
            b'1' => MessageFormat::ParseComplete,
            b'2' => MessageFormat::BindComplete,
            b'3' => MessageFormat::CloseComplete,
            b'A' => MessageFormat::NotificationResponse,
            b'C' => MessageFormat::CommandComplete,
            b'D' => MessageFormat::DataRow,
            b'E' => MessageFormat::ErrorResponse,
            b'I' => MessageFormat::EmptyQueryResponse,
            b'K' => MessageFormat::BackendKeyData,
            b'N' => MessageFormat::NoticeResponse,
            b'R' => MessageFormat::Authentication,
            b'S' => MessageFormat::ParameterStatus,
            b'T' => MessageFormat::RowDescription,
            b'Z' => MessageFormat::ReadyForQuery,
            b'n' => MessageFormat::NoData,
            b's' => MessageFormat::PortalSuspended,
            b't' => MessageFormat::ParameterDescription,

            _ => {
                return Err(err_protocol!(
                    "unknown message type: {:?}",
                    v as char
                ))
            }
        })
    }
}

/// One framed backend message: its type and its body.
#[derive(Debug)]
pub(crate) struct Message {
    pub(crate) format: MessageFormat,
    pub(crate) contents: Bytes,
}

impl Message {
    #[inline]
    pub(crate) fn decode<T: Decode>(self) -> Result<T, Error> {
        T::decode(self.contents)
    }
}
