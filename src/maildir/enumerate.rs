//! Directory enumeration: one [`PendingEntry`] per message file.

use std::path::Path;

use tracing::{debug, warn};

use super::{flags, ScanContext};
use crate::error::{Result, ScanError};
use crate::model::{MailboxKind, Message};

/// A discovered file awaiting parsing.
///
/// An entry whose `message` is `None` is a tombstone: a duplicate or a file
/// that failed to parse. Tombstones stay in the list and are skipped.
#[derive(Debug)]
pub struct PendingEntry {
    /// Inode number from the directory entry.
    pub inode: u64,
    pub message: Option<Message>,
    /// Set once the header is known, from disk or from the cache.
    pub parsed: bool,
}

impl PendingEntry {
    pub fn new(inode: u64, message: Message) -> Self {
        Self {
            inode,
            message: Some(message),
            parsed: false,
        }
    }

    /// Path relative to the mailbox root, `None` for a tombstone.
    pub fn path(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.path.as_str())
    }

    pub fn is_tombstone(&self) -> bool {
        self.message.is_none()
    }

    /// Drop the message, leaving a tombstone.
    pub fn discard(&mut self) {
        self.message = None;
        self.parsed = false;
    }
}

/// How an enumeration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enumerated {
    Complete,
    /// Interrupted by the cancellation token; the entries found so far
    /// were kept.
    Aborted,
}

/// MH message files are named by a positive decimal number.
pub fn is_mh_message_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// List `root/subdir` (or `root`) and append an entry per message file.
///
/// Maildir entries get their flags from the filename and are marked `old`
/// when found in `cur/` with `mark_old` set. The cancellation token is
/// polled (and cleared) before each directory entry.
pub fn parse_dir(
    root: &Path,
    kind: MailboxKind,
    subdir: Option<&str>,
    ctx: &ScanContext<'_>,
    entries: &mut Vec<PendingEntry>,
) -> Result<Enumerated> {
    let dir = match subdir {
        Some(sub) => root.join(sub),
        None => root.to_path_buf(),
    };
    let read_dir = std::fs::read_dir(&dir).map_err(|e| ScanError::io(&dir, e))?;

    let is_old = ctx.config.scan.mark_old && subdir == Some("cur");
    let progress = ctx.progress.filter(|_| ctx.config.scan.verbose);
    let mut found = 0usize;

    for dirent in read_dir {
        if ctx.cancel.take() {
            debug!(dir = %dir.display(), found, "Enumeration interrupted");
            return Ok(Enumerated::Aborted);
        }

        let dirent = match dirent {
            Ok(d) => d,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        let file_name = dirent.file_name();
        let Some(name) = file_name.to_str() else {
            warn!(dir = %dir.display(), name = ?file_name, "Skipping non UTF-8 file name");
            continue;
        };

        match kind {
            MailboxKind::Mh if !is_mh_message_name(name) => continue,
            MailboxKind::Maildir if name.starts_with('.') => continue,
            _ => {}
        }

        let path = match subdir {
            Some(sub) => format!("{sub}/{name}"),
            None => name.to_string(),
        };
        debug!(path = %path, "Queueing message");

        let mut message = Message::new(path);
        if kind == MailboxKind::Maildir {
            message.flags.old = is_old;
            flags::decode(&mut message, false);
        }

        entries.push(PendingEntry::new(inode_of(&dirent), message));
        found += 1;
        if let Some(p) = progress {
            p.update(found, None);
        }
    }

    Ok(Enumerated::Complete)
}

#[cfg(unix)]
fn inode_of(dirent: &std::fs::DirEntry) -> u64 {
    use std::os::unix::fs::DirEntryExt;
    dirent.ino()
}

#[cfg(not(unix))]
fn inode_of(_dirent: &std::fs::DirEntry) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::config::Config;
    use crate::maildir::sequences::MhSequenceFile;
    use crate::parser::Rfc5322Parser;

    #[test]
    fn test_mh_message_names() {
        assert!(is_mh_message_name("1"));
        assert!(is_mh_message_name("0042"));
        assert!(!is_mh_message_name(""));
        assert!(!is_mh_message_name(",12"));
        assert!(!is_mh_message_name(".mh_sequences"));
        assert!(!is_mh_message_name("12a"));
    }

    #[test]
    fn test_parse_dir_maildir_cur() {
        let dir = tempfile::tempdir().unwrap();
        let cur = dir.path().join("cur");
        std::fs::create_dir(&cur).unwrap();
        std::fs::write(cur.join("1:2,S"), b"Subject: a\n\n").unwrap();
        std::fs::write(cur.join("2:2,F"), b"Subject: b\n\n").unwrap();
        std::fs::write(cur.join(".hidden"), b"").unwrap();

        let config = Config::default();
        let cancel = CancelToken::new();
        let parser = Rfc5322Parser;
        let seqs = MhSequenceFile::new(&config.mh);
        let ctx = ScanContext::new(&config, &cancel, &parser, &seqs);

        let mut entries = Vec::new();
        let res = parse_dir(dir.path(), MailboxKind::Maildir, Some("cur"), &ctx, &mut entries)
            .unwrap();
        assert_eq!(res, Enumerated::Complete);
        assert_eq!(entries.len(), 2);

        let mut paths: Vec<&str> = entries.iter().filter_map(|e| e.path()).collect();
        paths.sort();
        assert_eq!(paths, vec!["cur/1:2,S", "cur/2:2,F"]);

        for e in &entries {
            let msg = e.message.as_ref().unwrap();
            assert!(msg.flags.old);
            assert!(!e.parsed);
        }
    }

    #[test]
    fn test_parse_dir_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let cancel = CancelToken::new();
        let parser = Rfc5322Parser;
        let seqs = MhSequenceFile::new(&config.mh);
        let ctx = ScanContext::new(&config, &cancel, &parser, &seqs);

        let mut entries = Vec::new();
        let err = parse_dir(dir.path(), MailboxKind::Maildir, Some("new"), &ctx, &mut entries)
            .unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_dir_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1"), b"Subject: a\n\n").unwrap();

        let config = Config::default();
        let cancel = CancelToken::new();
        let parser = Rfc5322Parser;
        let seqs = MhSequenceFile::new(&config.mh);
        let ctx = ScanContext::new(&config, &cancel, &parser, &seqs);

        cancel.cancel();
        let mut entries = Vec::new();
        let res = parse_dir(dir.path(), MailboxKind::Mh, None, &ctx, &mut entries).unwrap();
        assert_eq!(res, Enumerated::Aborted);
        assert!(entries.is_empty());
        // The interrupt was consumed.
        assert!(!cancel.is_cancelled());
    }
}
