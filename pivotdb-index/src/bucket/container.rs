//! # Bucket Containers
//!
//! One container per populated bucket id. Layout (little-endian):
//!
//! ```text
//! [level: u32][pivot_count: u32]
//! [mbr: (min: f64, max: f64) × pivot_count]
//! [member_count: u32][member tuple records...]
//! ```
//!
//! Members are stored as tuple records, see
//! [`pivotdb_core::serialization`].

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use pivotdb_core::serialization::{read_tuple_record, write_tuple_record};
use pivotdb_core::{Error, Interval, ObjectId, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct BucketMember {
    pub id: ObjectId,
    pub smap: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketContainer {
    pub level: u32,
    pub pivot_count: u32,
    pub members: Vec<BucketMember>,
    /// Grows with every insert, never shrinks
    pub mbr: Vec<Interval>,
}

impl BucketContainer {
    pub fn new(level: u32, pivot_count: usize) -> Self {
        Self {
            level,
            pivot_count: pivot_count as u32,
            members: Vec::new(),
            mbr: vec![Interval::new(f64::INFINITY, f64::NEG_INFINITY); pivot_count],
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn push(&mut self, member: BucketMember) {
        for (iv, &v) in self.mbr.iter_mut().zip(&member.smap) {
            iv.min = iv.min.min(v);
            iv.max = iv.max.max(v);
        }
        self.members.push(member);
    }

    /// Drop a member; the MBR keeps its extent
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.id != id);
        self.members.len() != before
    }

    /// Whether the query rectangle overlaps the MBR on every pivot
    pub fn collides(&self, rect: &[Interval]) -> bool {
        self.mbr.iter().zip(rect).all(|(m, q)| !m.is_empty() && m.overlaps(q))
    }

    pub fn encode(&self) -> Bytes {
        let member_size = 12 + self.mbr.len() * 8;
        let mut buf =
            Vec::with_capacity(12 + self.mbr.len() * 16 + self.members.len() * member_size);
        // Writes into a Vec cannot fail
        let _ = buf.write_u32::<LittleEndian>(self.level);
        let _ = buf.write_u32::<LittleEndian>(self.pivot_count);
        for iv in &self.mbr {
            let _ = buf.write_f64::<LittleEndian>(iv.min);
            let _ = buf.write_f64::<LittleEndian>(iv.max);
        }
        let _ = buf.write_u32::<LittleEndian>(self.members.len() as u32);
        for m in &self.members {
            write_tuple_record(&mut buf, m.id, &m.smap);
        }
        Bytes::from(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let level = cursor.read_u32::<LittleEndian>()?;
        let pivot_count = cursor.read_u32::<LittleEndian>()?;

        let mut mbr = Vec::with_capacity(pivot_count as usize);
        for _ in 0..pivot_count {
            let min = cursor.read_f64::<LittleEndian>()?;
            let max = cursor.read_f64::<LittleEndian>()?;
            mbr.push(Interval::new(min, max));
        }

        let count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut members = Vec::with_capacity(count.min(bytes.len() / 12));
        for _ in 0..count {
            let (id, smap) = read_tuple_record(&mut cursor)?;
            if smap.len() != pivot_count as usize {
                return Err(Error::Codec {
                    message: format!(
                        "Member {} has {} distances, container has {} pivots",
                        id,
                        smap.len(),
                        pivot_count
                    ),
                });
            }
            members.push(BucketMember { id, smap });
        }

        if cursor.position() as usize != bytes.len() {
            return Err(Error::Codec {
                message: format!(
                    "Trailing bytes after bucket container: {} of {}",
                    cursor.position(),
                    bytes.len()
                ),
            });
        }

        Ok(Self {
            level,
            pivot_count,
            members,
            mbr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: ObjectId, smap: &[f64]) -> BucketMember {
        BucketMember { id, smap: smap.to_vec() }
    }

    #[test]
    fn test_mbr_extends_and_never_shrinks() {
        let mut c = BucketContainer::new(0, 2);
        assert!(!c.collides(&[Interval::new(0.0, 10.0), Interval::new(0.0, 10.0)]));

        c.push(member(1, &[2.0, 5.0]));
        c.push(member(2, &[4.0, 3.0]));
        assert_eq!(c.mbr, vec![Interval::new(2.0, 4.0), Interval::new(3.0, 5.0)]);

        assert!(c.remove(2));
        assert!(!c.remove(2));
        assert_eq!(c.mbr, vec![Interval::new(2.0, 4.0), Interval::new(3.0, 5.0)]);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_collides() {
        let mut c = BucketContainer::new(0, 2);
        c.push(member(1, &[2.0, 5.0]));
        c.push(member(2, &[4.0, 3.0]));
        assert!(c.collides(&[Interval::new(4.0, 6.0), Interval::new(0.0, 3.0)]));
        assert!(!c.collides(&[Interval::new(4.5, 6.0), Interval::new(0.0, 10.0)]));
        assert!(!c.collides(&[Interval::new(0.0, 10.0), Interval::new(5.5, 7.0)]));
    }

    #[test]
    fn test_codec() {
        let mut c = BucketContainer::new(0, 3);
        c.push(member(10, &[1.0, 2.0, 3.0]));
        c.push(member(11, &[0.5, 8.0, 3.5]));
        let bytes = c.encode();
        assert_eq!(BucketContainer::decode(&bytes).unwrap(), c);

        let empty = BucketContainer::new(0, 3);
        let decoded = BucketContainer::decode(&empty.encode()).unwrap();
        assert!(decoded.is_empty());
        assert!(decoded.mbr.iter().all(|iv| iv.is_empty()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut c = BucketContainer::new(0, 2);
        c.push(member(1, &[1.0, 2.0]));
        let mut bytes = c.encode().to_vec();
        bytes.push(0);
        assert!(BucketContainer::decode(&bytes).is_err());
        assert!(BucketContainer::decode(&bytes[..10]).is_err());
    }
}
