//! Record codec
//!
//! A record is the unit of durable state in the log.
//!
//! ## Wire Layout
//! ```text
//! ┌───────────────┬─────────────────┬────────────┬───────────┬─────────────┐
//! │ KeySize (4 BE)│ ValueSize (4 BE)│ Mark (2 BE)│ Key bytes │ Value bytes │
//! └───────────────┴─────────────────┴────────────┴───────────┴─────────────┘
//! ```
//! Mark: 0 = put, 1 = delete. No checksum and no padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, StoreError};

/// Header size: KeySize (4) + ValueSize (4) + Mark (2) = 10 bytes
pub const HEADER_SIZE: usize = 10;

/// Largest key or value the 32-bit size fields can describe
pub const MAX_FIELD_SIZE: usize = u32::MAX as usize;

/// Size field for a `len`-byte key or value
///
/// Fails with `InvalidArgument` when `len` does not fit the header.
pub(crate) fn check_len(field: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        StoreError::InvalidArgument(format!(
            "{} of {} bytes exceeds the {} byte limit",
            field, len, MAX_FIELD_SIZE
        ))
    })
}

/// Whether a record writes or deletes its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Mark {
    Put = 0,
    Delete = 1,
}

impl Mark {
    fn from_u16(raw: u16) -> Result<Self> {
        match raw {
            0 => Ok(Mark::Put),
            1 => Ok(Mark::Delete),
            other => Err(StoreError::CorruptHeader(format!(
                "unknown mark {}",
                other
            ))),
        }
    }
}

/// Decoded fixed-size header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub key_size: u32,
    pub value_size: u32,
    pub mark: Mark,
}

impl RecordHeader {
    /// Bytes following the header
    pub fn payload_size(&self) -> usize {
        self.key_size as usize + self.value_size as usize
    }

    /// Full encoded size of the record this header belongs to
    pub fn record_size(&self) -> u64 {
        (HEADER_SIZE + self.payload_size()) as u64
    }
}

/// A single log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
    pub mark: Mark,
}

impl Record {
    /// Create a put record
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            mark: Mark::Put,
        }
    }

    /// Create a tombstone for `key`
    pub fn delete(key: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: Bytes::new(),
            mark: Mark::Delete,
        }
    }

    /// Key length as stored in the header; only exact after `validate`
    pub fn key_size(&self) -> u32 {
        self.key.len() as u32
    }

    /// Value length as stored in the header; only exact after `validate`
    pub fn value_size(&self) -> u32 {
        self.value.len() as u32
    }

    /// Check that both lengths fit their header fields
    pub fn validate(&self) -> Result<()> {
        check_len("key", self.key.len())?;
        check_len("value", self.value.len())?;
        Ok(())
    }

    pub fn is_tombstone(&self) -> bool {
        self.mark == Mark::Delete
    }

    /// Encoded size in bytes (header + key + value)
    pub fn size(&self) -> u64 {
        (HEADER_SIZE + self.key.len() + self.value.len()) as u64
    }

    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            key_size: self.key_size(),
            value_size: self.value_size(),
            mark: self.mark,
        }
    }

    /// Serialize to the on-disk layout
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size() as usize);
        buf.put_u32(self.key_size());
        buf.put_u32(self.value_size());
        buf.put_u16(self.mark as u16);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        buf.freeze()
    }

    /// Deserialize one record from the start of `buf`
    ///
    /// Trailing bytes after the record are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = decode_header(buf)?;
        let payload = &buf[HEADER_SIZE..];
        if payload.len() < header.payload_size() {
            return Err(StoreError::CorruptBody(format!(
                "need {} payload bytes, have {}",
                header.payload_size(),
                payload.len()
            )));
        }
        Ok(Self::from_parts(header, payload))
    }

    /// Build a record from an already decoded header and its payload
    pub(crate) fn from_parts(header: RecordHeader, payload: &[u8]) -> Self {
        let key_end = header.key_size as usize;
        let value_end = key_end + header.value_size as usize;
        Self {
            key: Bytes::copy_from_slice(&payload[..key_end]),
            value: Bytes::copy_from_slice(&payload[key_end..value_end]),
            mark: header.mark,
        }
    }
}

/// Decode the 10-byte header at the start of `buf`
pub fn decode_header(mut buf: &[u8]) -> Result<RecordHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(StoreError::CorruptHeader(format!(
            "need {} header bytes, have {}",
            HEADER_SIZE,
            buf.len()
        )));
    }
    let key_size = buf.get_u32();
    let value_size = buf.get_u32();
    let mark = Mark::from_u16(buf.get_u16())?;
    Ok(RecordHeader {
        key_size,
        value_size,
        mark,
    })
}
