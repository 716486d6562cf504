use bytes::Bytes;

use crate::error::Error;
use crate::io::Decode;

/// The backend's transaction state, carried on every `ReadyForQuery`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Not in a transaction block.
    Idle = b'I',

    /// In a transaction block.
    Transaction = b'T',

    /// In a _failed_ transaction block. Queries will be rejected until the
    /// block is ended.
    Error = b'E',
}

/// Sent whenever the backend is ready for a new query cycle; the sole
/// synchronization fence of a pipeline.
#[derive(Debug)]
pub(crate) struct ReadyForQuery {
    pub transaction_status: TransactionStatus,
}

impl Decode for ReadyForQuery {
    fn decode(buf: Bytes) -> Result<Self, Error> {
        let status = match buf.first() {
            Some(b'I') => TransactionStatus::Idle,
            Some(b'T') => TransactionStatus::Transaction,
            Some(b'E') => TransactionStatus::Error,

            other => {
                return Err(err_protocol!(
                    "unknown transaction status in ReadyForQuery: {:?}",
                    other
                ));
            }
        };

        Ok(Self {
            transaction_status: status,
        })
    }
}

#[test]
fn it_decodes_ready_for_query() {
    const DATA: &[u8] = b"E";

    let m = ReadyForQuery::decode(DATA.into()).unwrap();

    assert_eq!(m.transaction_status, TransactionStatus::Error);
}
