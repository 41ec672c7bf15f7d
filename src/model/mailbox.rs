//! An open directory mailbox and its message index.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use super::message::{Message, MessageFlags};

/// On-disk layout of a directory mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxKind {
    /// `new/`, `cur/` and `tmp/` with flags in the filenames.
    Maildir,
    /// Numbered files with flags in `.mh_sequences`.
    Mh,
}

impl std::fmt::Display for MailboxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailboxKind::Maildir => f.write_str("maildir"),
            MailboxKind::Mh => f.write_str("mh"),
        }
    }
}

/// Growable array of messages. Only ever appended to.
#[derive(Debug, Default)]
pub struct MessageIndex {
    messages: Vec<Message>,
}

impl MessageIndex {
    /// Capacity is added in chunks of this many slots.
    pub const GROWTH: usize = 25;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.messages.capacity()
    }

    pub fn get(&self, idx: usize) -> Option<&Message> {
        self.messages.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Message> {
        self.messages.get_mut(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Message> {
        self.messages.iter_mut()
    }

    /// Append a message and return its position.
    pub fn push(&mut self, mut message: Message) -> usize {
        if self.messages.len() == self.messages.capacity() {
            self.messages.reserve_exact(Self::GROWTH);
        }
        let idx = self.messages.len();
        message.index = Some(idx);
        self.messages.push(message);
        idx
    }
}

/// An open Maildir or MH folder.
#[derive(Debug)]
pub struct Mailbox {
    /// Root directory.
    pub path: PathBuf,
    pub kind: MailboxKind,
    pub messages: MessageIndex,

    /// Total size in bytes of all message files.
    pub size: u64,
    pub unread: usize,
    /// Unread messages that are not old.
    pub new: usize,
    pub flagged: usize,
    pub deleted: usize,

    /// Maildir: `new/`. MH: the mailbox directory.
    pub(crate) mtime: Option<SystemTime>,
    /// Maildir: `cur/`. MH: `.mh_sequences`.
    pub(crate) mtime_cur: Option<SystemTime>,
}

impl Mailbox {
    pub fn new(path: impl Into<PathBuf>, kind: MailboxKind) -> Self {
        Self {
            path: path.into(),
            kind,
            messages: MessageIndex::new(),
            size: 0,
            unread: 0,
            new: 0,
            flagged: 0,
            deleted: 0,
            mtime: None,
            mtime_cur: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Append a message, accounting for its size.
    pub fn push(&mut self, message: Message) -> usize {
        self.size += message.size;
        self.messages.push(message)
    }

    /// Replace the flags of message `idx` and mark it for write-back if they
    /// differ. Returns whether anything changed.
    ///
    /// Counters are not touched; call [`update_counters`](Self::update_counters)
    /// after a batch of changes.
    pub fn set_flags(&mut self, idx: usize, flags: MessageFlags) -> bool {
        let Some(msg) = self.messages.get_mut(idx) else {
            return false;
        };
        if msg.flags == flags {
            return false;
        }
        msg.flags = flags;
        msg.changed = true;
        true
    }

    /// Recompute the unread, new, flagged and deleted counters.
    pub fn update_counters(&mut self) {
        self.unread = 0;
        self.new = 0;
        self.flagged = 0;
        self.deleted = 0;
        for msg in self.messages.iter() {
            if !msg.flags.read {
                self.unread += 1;
                if !msg.flags.old {
                    self.new += 1;
                }
            }
            if msg.flags.flagged {
                self.flagged += 1;
            }
            if msg.flags.deleted {
                self.deleted += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_grows_in_chunks() {
        let mut index = MessageIndex::new();
        assert_eq!(index.capacity(), 0);

        for i in 0..30 {
            let pos = index.push(Message::new(i.to_string()));
            assert_eq!(pos, i);
            assert_eq!(index.get(i).and_then(|m| m.index), Some(i));
        }
        assert_eq!(index.len(), 30);
        assert!(index.capacity() >= 30);
    }

    #[test]
    fn test_mailbox_counters() {
        let mut mbox = Mailbox::new("/tmp/x", MailboxKind::Maildir);

        let mut a = Message::new("cur/a");
        a.size = 10;
        a.flags.old = true;
        let mut b = Message::new("new/b");
        b.size = 20;
        b.flags.flagged = true;
        let mut c = Message::new("cur/c");
        c.size = 5;
        c.flags.read = true;
        c.flags.deleted = true;

        mbox.push(a);
        mbox.push(b);
        mbox.push(c);
        mbox.update_counters();

        assert_eq!(mbox.count(), 3);
        assert_eq!(mbox.size, 35);
        assert_eq!(mbox.unread, 2);
        assert_eq!(mbox.new, 1);
        assert_eq!(mbox.flagged, 1);
        assert_eq!(mbox.deleted, 1);
    }

    #[test]
    fn test_set_flags_marks_changed() {
        let mut mbox = Mailbox::new("/tmp/x", MailboxKind::Mh);
        mbox.push(Message::new("1"));

        let mut flags = MessageFlags::default();
        assert!(!mbox.set_flags(0, flags));
        assert!(!mbox.set_flags(5, flags));

        flags.read = true;
        assert!(mbox.set_flags(0, flags));
        let msg = mbox.messages.get(0).unwrap();
        assert!(msg.changed);
        assert!(msg.flags.read);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MailboxKind::Maildir.to_string(), "maildir");
        assert_eq!(MailboxKind::Mh.to_string(), "mh");
    }
}
