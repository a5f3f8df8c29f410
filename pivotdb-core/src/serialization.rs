//! Record encoding for the ordered stores.
//!
//! Tuple records are laid out little-endian:
//!
//! ```text
//! [id: u64][len: u32][f64; len]
//! ```

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::{ObjectId, PivotTuple};

/// Encode an (object id, pivot tuple) record
pub fn encode_tuple_record(id: ObjectId, tuple: &[f64]) -> Bytes {
    let mut buf = Vec::with_capacity(12 + tuple.len() * 8);
    write_tuple_record(&mut buf, id, tuple);
    Bytes::from(buf)
}

/// Append an (object id, pivot tuple) record to a buffer
pub fn write_tuple_record(buf: &mut Vec<u8>, id: ObjectId, tuple: &[f64]) {
    // Writes into a Vec cannot fail
    let _ = buf.write_u64::<LittleEndian>(id);
    let _ = buf.write_u32::<LittleEndian>(tuple.len() as u32);
    for &v in tuple {
        let _ = buf.write_f64::<LittleEndian>(v);
    }
}

/// Decode a record written by [`encode_tuple_record`]
pub fn decode_tuple_record(bytes: &[u8]) -> Result<(ObjectId, PivotTuple)> {
    let mut cursor = Cursor::new(bytes);
    let record = read_tuple_record(&mut cursor)?;
    if cursor.position() as usize != bytes.len() {
        return Err(Error::codec(format!(
            "Trailing bytes after tuple record: {} of {}",
            cursor.position(),
            bytes.len()
        )));
    }
    Ok(record)
}

/// Read one tuple record from a cursor
pub fn read_tuple_record(cursor: &mut Cursor<&[u8]>) -> Result<(ObjectId, PivotTuple)> {
    let id = cursor.read_u64::<LittleEndian>().map_err(truncated)?;
    let len = cursor.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if remaining < len * 8 {
        return Err(Error::codec(format!(
            "Tuple record declares {} values but only {} bytes remain",
            len, remaining
        )));
    }
    let mut tuple = Vec::with_capacity(len);
    for _ in 0..len {
        tuple.push(cursor.read_f64::<LittleEndian>().map_err(truncated)?);
    }
    Ok((id, tuple))
}

fn truncated(err: std::io::Error) -> Error {
    Error::codec(format!("Truncated record: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let tuple = vec![0.0, 1.5, 3.25, 8.0];
        let bytes = encode_tuple_record(42, &tuple);
        let (id, decoded) = decode_tuple_record(&bytes).unwrap();
        assert_eq!(id, 42);
        assert_eq!(decoded, tuple);
    }

    #[test]
    fn test_truncated_record_is_rejected() {
        let bytes = encode_tuple_record(7, &[1.0, 2.0]);
        let err = decode_tuple_record(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.error_code(), "CODEC_ERROR");
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = encode_tuple_record(7, &[1.0]).to_vec();
        bytes.push(0);
        assert!(decode_tuple_record(&bytes).is_err());
    }
}
