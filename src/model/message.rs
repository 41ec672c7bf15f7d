//! A single message file and its parsed metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State bits for a message.
///
/// For Maildir these come from the `:2,` suffix of the filename; for MH
/// from the `.mh_sequences` file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlags {
    /// Seen (`S`).
    pub read: bool,
    /// Answered (`R`).
    pub replied: bool,
    /// Flagged for urgent/special attention (`F`).
    pub flagged: bool,
    /// Trashed (`T`).
    pub trashed: bool,
    /// Marked for deletion. Set together with `trashed`.
    pub deleted: bool,
    /// Already seen by a mail reader (lives in Maildir `cur/`).
    pub old: bool,
}

/// Envelope fields taken from the message header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Decoded `From:` value.
    pub from: String,
    /// Decoded `Subject:` value.
    pub subject: String,
    /// `Message-ID`, including angle brackets.
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

/// One message of a directory mailbox.
///
/// Created from a directory entry with only `path` and `flags` known, then
/// filled in from the header cache or by parsing the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Path relative to the mailbox root, e.g. `cur/1001.host:2,S` or `17`.
    pub path: String,

    pub flags: MessageFlags,

    /// Letters from the filename flag run that have no meaning here.
    /// Kept verbatim, in order, so they survive a rename. `None` when empty.
    pub maildir_flags: Option<String>,

    pub envelope: Envelope,

    /// From the `Date:` header, Unix epoch when absent or unparseable.
    pub date_sent: DateTime<Utc>,

    /// From the first `Received:` header, or `date_sent`.
    pub received: DateTime<Utc>,

    /// File size in bytes at the time of the last parse.
    pub size: u64,

    /// Byte offset of the body (length of the header block).
    pub body_offset: u64,

    /// Position in the mailbox index, assigned when the message is added.
    #[serde(skip)]
    pub index: Option<usize>,

    /// The flags were modified locally and not yet written back.
    #[serde(skip)]
    pub changed: bool,

    /// Seen in the most recent check of the mailbox.
    #[serde(skip)]
    pub active: bool,

    /// The file vanished from disk and the message should be dropped.
    #[serde(skip)]
    pub purge: bool,
}

impl Message {
    /// A message known only by its path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: MessageFlags::default(),
            maildir_flags: None,
            envelope: Envelope::default(),
            date_sent: DateTime::UNIX_EPOCH,
            received: DateTime::UNIX_EPOCH,
            size: 0,
            body_offset: 0,
            index: None,
            changed: false,
            active: false,
            purge: false,
        }
    }

    /// Last component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// MH message number, parsed from the last path component.
    pub fn mh_number(&self) -> Option<u32> {
        self.file_name().parse().ok()
    }

    /// Length of the body in bytes.
    pub fn body_len(&self) -> u64 {
        self.size.saturating_sub(self.body_offset)
    }
}
