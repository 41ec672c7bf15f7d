//! Header cache file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (64 bytes, fixed)             │
//! │  magic: [u8; 8] = b"MDXHCACH"        │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  entry_count: u64                    │
//! │  created: i64                        │
//! │  (padding to 64 bytes)               │
//! ├──────────────────────────────────────┤
//! │ ENTRIES (variable)                   │
//! │  bincode HashMap<String, Vec<u8>>    │
//! └──────────────────────────────────────┘
//! ```
//!
//! Each entry value is a record:
//!
//! ```text
//!  validity: u32 (big endian, Unix seconds when stored)
//!  layout:   u32 (big endian, must equal RECORD_LAYOUT)
//!  message:  bincode Message
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::model::Message;

/// Magic bytes identifying a maildex header cache.
pub const MAGIC: &[u8; 8] = b"MDXHCACH";

/// Current file format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Tag of the serialized `Message` layout. Records with another tag were
/// written by a build with a different `Message` and are ignored.
pub const RECORD_LAYOUT: u32 = 0x4d44_0001;

/// Serializable file header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CacheHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Reserved.
    pub flags: u32,
    pub entry_count: u64,
    /// When the file was written (Unix seconds).
    pub created: i64,
}

impl CacheHeader {
    pub fn new(entry_count: u64, created: i64) -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            entry_count,
            created,
        }
    }

    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        Ok(())
    }
}

/// Serialize a record.
pub fn encode_record(validity: u32, message: &Message) -> bincode::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    buf.write_u32::<BigEndian>(validity)?;
    buf.write_u32::<BigEndian>(RECORD_LAYOUT)?;
    bincode::serialize_into(&mut buf, message)?;
    Ok(buf)
}

/// Deserialize a record. `None` if it is truncated, corrupt, or has
/// another layout.
pub fn decode_record(bytes: &[u8]) -> Option<(u32, Message)> {
    let mut cursor = bytes;
    let validity = cursor.read_u32::<BigEndian>().ok()?;
    let layout = cursor.read_u32::<BigEndian>().ok()?;
    if layout != RECORD_LAYOUT {
        return None;
    }
    let message = bincode::deserialize(cursor).ok()?;
    Some((validity, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fits() {
        let bytes = bincode::serialize(&CacheHeader::new(u64::MAX, i64::MIN)).unwrap();
        assert!(bytes.len() <= HEADER_SIZE);
    }

    #[test]
    fn test_header_validate() {
        let mut header = CacheHeader::new(0, 0);
        assert!(header.validate().is_ok());
        header.version = 99;
        assert!(header.validate().is_err());
        header.magic = *b"NOTCACHE";
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_record_layout_mismatch() {
        let mut bytes = encode_record(1_700_000_000, &Message::new("/17")).unwrap();
        let (validity, msg) = decode_record(&bytes).unwrap();
        assert_eq!(validity, 1_700_000_000);
        assert_eq!(msg.path, "/17");

        bytes[7] ^= 0xff;
        assert!(decode_record(&bytes).is_none());
        assert!(decode_record(&bytes[..5]).is_none());
    }
}
