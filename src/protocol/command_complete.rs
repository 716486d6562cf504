use bytes::Bytes;

use crate::error::Error;
use crate::io::{BufExt, Decode};
use crate::statement::StatementType;
use crate::types::Oid;

/// The command tag sent when a SQL command completes normally, e.g.
/// `INSERT 0 1` or `SELECT 42`.
#[derive(Debug)]
pub(crate) struct CommandComplete {
    tag: String,
}

impl Decode for CommandComplete {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        Ok(Self {
            tag: buf.get_str_nul()?,
        })
    }
}

impl CommandComplete {
    /// The kind of statement that completed, from the first word of the tag.
    pub(crate) fn statement_type(&self) -> StatementType {
        StatementType::from_tag_word(self.tag.split(' ').next().unwrap_or(""))
    }

    /// The number of rows affected, from the last word of the tag.
    ///
    /// Tags such as `CREATE TABLE` carry no count; that reads as zero rows.
    pub(crate) fn rows_affected(&self) -> u64 {
        self.tag
            .rsplit(' ')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// For `INSERT` into a table with OIDs, the object ID of the single
    /// inserted row; zero in every other case.
    pub(crate) fn inserted_oid(&self) -> Oid {
        if !self.tag.starts_with("INSERT ") {
            return Oid(0);
        }

        self.tag
            .split(' ')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .map_or(Oid(0), Oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(tag: &'static [u8]) -> CommandComplete {
        CommandComplete::decode(Bytes::from_static(tag)).unwrap()
    }

    #[test]
    fn it_parses_insert_tag() {
        let cc = decode(b"INSERT 0 1\0");

        assert_eq!(cc.statement_type(), StatementType::Insert);
        assert_eq!(cc.rows_affected(), 1);
        assert_eq!(cc.inserted_oid(), Oid(0));
    }

    #[test]
    fn it_parses_insert_with_oid() {
        let cc = decode(b"INSERT 16429 1\0");

        assert_eq!(cc.rows_affected(), 1);
        assert_eq!(cc.inserted_oid(), Oid(16429));
    }

    #[test]
    fn it_parses_select_tag() {
        let cc = decode(b"SELECT 42\0");

        assert_eq!(cc.statement_type(), StatementType::Select);
        assert_eq!(cc.rows_affected(), 42);
        assert_eq!(cc.inserted_oid(), Oid(0));
    }

    #[test]
    fn it_parses_update_tag() {
        let cc = decode(b"UPDATE 512\0");

        assert_eq!(cc.statement_type(), StatementType::Update);
        assert_eq!(cc.rows_affected(), 512);
    }

    #[test]
    fn it_parses_tag_without_count() {
        let cc = decode(b"CREATE TABLE\0");

        assert_eq!(cc.statement_type(), StatementType::Other);
        assert_eq!(cc.rows_affected(), 0);
    }

    #[test]
    fn it_parses_begin_tag() {
        let cc = decode(b"BEGIN\0");

        assert_eq!(cc.statement_type(), StatementType::Begin);
        assert_eq!(cc.rows_affected(), 0);
    }
}
