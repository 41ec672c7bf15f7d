//! Header cache: parsed message metadata kept across runs.

pub mod file;
pub mod format;

pub use file::FileHeaderCache;

use crate::error::Result;
use crate::model::{MailboxKind, Message};

/// A cache hit.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub message: Message,
    /// Unix time (seconds) at which the entry was stored. A file modified
    /// later than this has to be parsed again.
    pub validity: u32,
}

/// Key-value store of parsed messages.
pub trait HeaderCache {
    fn fetch(&mut self, key: &str) -> Option<CachedMessage>;
    fn store(&mut self, key: &str, message: &Message) -> Result<()>;
}

/// Cache key of a message path.
///
/// MH uses the path as is. Maildir drops the three-byte `new`/`cur` prefix
/// and the flag suffix, so a message keeps its key when it moves to `cur/`
/// or changes flags: `cur/1001.host:2,S` becomes `/1001.host`.
pub fn cache_key(kind: MailboxKind, path: &str) -> &str {
    match kind {
        MailboxKind::Mh => path,
        MailboxKind::Maildir => {
            let rest = path.get(3..).unwrap_or(path);
            match rest.rfind(':') {
                Some(pos) => &rest[..pos],
                None => rest,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key(MailboxKind::Mh, "17"), "17");
        assert_eq!(cache_key(MailboxKind::Maildir, "cur/1001.host:2,S"), "/1001.host");
        assert_eq!(cache_key(MailboxKind::Maildir, "new/1001.host"), "/1001.host");
        assert_eq!(
            cache_key(MailboxKind::Maildir, "new/1001.host"),
            cache_key(MailboxKind::Maildir, "cur/1001.host:2,FS")
        );
        assert_eq!(cache_key(MailboxKind::Maildir, "ab"), "ab");
    }
}
