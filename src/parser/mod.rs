//! Message header parsing.

pub mod header;

use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::Envelope;

pub use header::Rfc5322Parser;

/// What a header parser extracts from one message file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHeader {
    pub envelope: Envelope,
    pub date_sent: Option<DateTime<Utc>>,
    pub received: Option<DateTime<Utc>>,
    /// Bytes up to and including the blank line that ends the header.
    pub body_offset: u64,
}

/// Reads the header block of a message.
pub trait HeaderParser {
    /// Parse the header from `reader`, which is positioned at the start of
    /// the file. `path` is only used in error messages.
    ///
    /// Returns [`ScanError::InvalidHeader`](crate::error::ScanError::InvalidHeader)
    /// when the data is not a mail message.
    fn read_header(&self, path: &Path, reader: &mut dyn BufRead) -> Result<ParsedHeader>;
}
