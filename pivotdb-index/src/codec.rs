//! Object codecs for the raw-object table.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use pivotdb_core::{Error, ObjectCodec, Result};

/// UTF-8 strings, stored as their bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ObjectCodec<String> for StringCodec {
    fn encode(&self, object: &String) -> Vec<u8> {
        object.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Codec {
            message: format!("Invalid UTF-8 object: {}", e),
        })
    }
}

/// Dense `f32` vectors: `[len: u32][f32; len]`, little-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorCodec;

impl ObjectCodec<Vec<f32>> for VectorCodec {
    fn encode(&self, object: &Vec<f32>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + object.len() * 4);
        // Writes into a Vec cannot fail
        let _ = buf.write_u32::<LittleEndian>(object.len() as u32);
        for &v in object {
            let _ = buf.write_f32::<LittleEndian>(v);
        }
        buf
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let mut cursor = Cursor::new(bytes);
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        if bytes.len() != 4 + len * 4 {
            return Err(Error::Codec {
                message: format!(
                    "Vector of {} components needs {} bytes, got {}",
                    len,
                    4 + len * 4,
                    bytes.len()
                ),
            });
        }
        let mut vector = Vec::with_capacity(len);
        for _ in 0..len {
            vector.push(cursor.read_f32::<LittleEndian>()?);
        }
        Ok(vector)
    }
}
