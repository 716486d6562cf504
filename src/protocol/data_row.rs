use std::ops::Range;

use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::Decode;

/// One row of a result set.
///
/// Decoding builds an offset table into the retained message body; column
/// bytes are not copied or interpreted until asked for.
#[derive(Debug)]
pub(crate) struct DataRow {
    storage: Bytes,

    /// Ranges into `storage` for each column value; `None` is a NULL.
    values: Vec<Option<Range<u32>>>,
}

impl DataRow {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    /// The raw bytes of the column at `index`, or `None` for NULL.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&[u8]> {
        let range = self.values[index].as_ref()?;

        Some(&self.storage[(range.start as usize)..(range.end as usize)])
    }
}

impl Decode for DataRow {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("DataRow message too short"));
        }

        let cnt = buf.get_u16() as usize;

        let storage = buf.clone();
        let mut values = Vec::with_capacity(cnt);

        // offset of the next value, relative to `storage`
        let mut offset: u32 = 0;

        for _ in 0..cnt {
            if buf.remaining() < 4 {
                return Err(err_protocol!("truncated value length in DataRow"));
            }

            // The length of the column value, in bytes (this count does not
            // include itself). Can be zero. As a special case, -1 indicates a
            // NULL column value; no value bytes follow in the NULL case.
            let size = buf.get_i32();
            offset += 4;

            if size == -1 {
                values.push(None);
            } else {
                let size = size as u32;

                if buf.remaining() < size as usize {
                    return Err(err_protocol!("truncated value in DataRow"));
                }

                values.push(Some(offset..(offset + size)));

                buf.advance(size as usize);
                offset += size;
            }
        }

        Ok(Self { storage, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_decodes_data_row() {
        // three columns: (1, NULL, 2)
        const DATA: &[u8] = b"\x00\x03\x00\x00\x00\x04\x00\x00\x00\x01\xff\xff\xff\xff\x00\x00\x00\x04\x00\x00\x00\x02";

        let row = DataRow::decode(Bytes::from_static(DATA)).unwrap();

        assert_eq!(row.len(), 3);

        assert_eq!(row.get(0), Some(&[0, 0, 0, 1][..]));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), Some(&[0, 0, 0, 2][..]));
    }

    #[test]
    fn it_rejects_truncated_data_row() {
        const DATA: &[u8] = b"\x00\x01\x00\x00\x00\x08\x00\x00";

        assert!(DataRow::decode(Bytes::from_static(DATA)).is_err());
    }
}
