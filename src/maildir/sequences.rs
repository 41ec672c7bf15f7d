//! MH sequences: the `.mh_sequences` file.
//!
//! ```text
//! unseen: 3 5-9 12
//! flagged: 4
//! replied: 1-2
//! ```
//!
//! Only three sequences carry flags; their names come from [`MhConfig`].
//! Every other line is ignored.

use std::path::Path;

use tracing::debug;

use super::enumerate::PendingEntry;
use crate::config::MhConfig;
use crate::error::{Result, ScanError};
use crate::model::Message;

/// Name of the sequences file inside an MH folder.
pub const SEQUENCES_FILE: &str = ".mh_sequences";

/// Flags of one MH message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceFlags {
    pub unseen: bool,
    pub flagged: bool,
    pub replied: bool,
}

/// Message-number ranges of the flag-carrying sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MhSequences {
    unseen: Vec<(u32, u32)>,
    flagged: Vec<(u32, u32)>,
    replied: Vec<(u32, u32)>,
}

fn contains(ranges: &[(u32, u32)], n: u32) -> bool {
    ranges.iter().any(|&(first, last)| first <= n && n <= last)
}

impl MhSequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.unseen.is_empty() && self.flagged.is_empty() && self.replied.is_empty()
    }

    /// Flags of message `n`.
    pub fn check(&self, n: u32) -> SequenceFlags {
        SequenceFlags {
            unseen: contains(&self.unseen, n),
            flagged: contains(&self.flagged, n),
            replied: contains(&self.replied, n),
        }
    }

    pub fn add_unseen(&mut self, first: u32, last: u32) {
        self.unseen.push((first, last));
    }

    pub fn add_flagged(&mut self, first: u32, last: u32) {
        self.flagged.push((first, last));
    }

    pub fn add_replied(&mut self, first: u32, last: u32) {
        self.replied.push((first, last));
    }

    /// The three flag sequences as `.mh_sequences` lines. Empty sequences
    /// are left out, overlapping and adjacent ranges are merged.
    pub fn render(&self, names: &MhConfig) -> String {
        let mut out = String::new();
        for (name, ranges) in [
            (&names.seq_unseen, &self.unseen),
            (&names.seq_flagged, &self.flagged),
            (&names.seq_replied, &self.replied),
        ] {
            if ranges.is_empty() {
                continue;
            }
            out.push_str(name);
            out.push(':');
            for (first, last) in merge_ranges(ranges) {
                if first == last {
                    out.push_str(&format!(" {first}"));
                } else {
                    out.push_str(&format!(" {first}-{last}"));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Parse the contents of a sequences file. `path` is for error reporting.
    pub fn parse(text: &str, names: &MhConfig, path: &Path) -> Result<Self> {
        let mut seqs = Self::new();

        for line in text.lines() {
            let mut tokens = line
                .split([' ', '\t', ':'])
                .filter(|t| !t.is_empty());
            let Some(name) = tokens.next() else {
                continue;
            };

            let target = if name == names.seq_unseen {
                &mut seqs.unseen
            } else if name == names.seq_flagged {
                &mut seqs.flagged
            } else if name == names.seq_replied {
                &mut seqs.replied
            } else {
                continue;
            };

            for token in tokens {
                let range = parse_range(token).ok_or_else(|| ScanError::InvalidSequences {
                    path: path.to_path_buf(),
                    reason: format!("bad range '{token}' in sequence '{name}'"),
                })?;
                target.push(range);
            }
        }

        Ok(seqs)
    }
}

/// `N` or `FIRST-LAST`.
fn parse_range(token: &str) -> Option<(u32, u32)> {
    match token.split_once('-') {
        Some((first, last)) => Some((first.parse().ok()?, last.parse().ok()?)),
        None => {
            let n = token.parse().ok()?;
            Some((n, n))
        }
    }
}

fn merge_ranges(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable();
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
    for (first, last) in sorted {
        match merged.last_mut() {
            Some(prev) if first <= prev.1.saturating_add(1) => prev.1 = prev.1.max(last),
            _ => merged.push((first, last)),
        }
    }
    merged
}

/// Rewrite `.mh_sequences` in `mailbox` from the flags of `messages`.
///
/// Lines of sequences other than the three flag sequences are copied
/// unchanged. Deleted messages are left out of every sequence. The file is
/// written next to the old one and renamed over it.
pub fn write_sequences<'m>(
    mailbox: &Path,
    messages: impl IntoIterator<Item = &'m Message>,
    names: &MhConfig,
) -> Result<()> {
    let path = mailbox.join(SEQUENCES_FILE);
    let old = match std::fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ScanError::io(path, e)),
    };

    let ours = [
        names.seq_unseen.as_str(),
        names.seq_flagged.as_str(),
        names.seq_replied.as_str(),
    ];
    let mut text = String::new();
    for line in old.lines() {
        let name = line.split(':').next().unwrap_or_default().trim();
        if ours.contains(&name) {
            continue;
        }
        text.push_str(line);
        text.push('\n');
    }

    let mut seqs = MhSequences::new();
    for msg in messages {
        if msg.flags.deleted {
            continue;
        }
        let Some(n) = msg.mh_number() else {
            continue;
        };
        if !msg.flags.read {
            seqs.add_unseen(n, n);
        }
        if msg.flags.flagged {
            seqs.add_flagged(n, n);
        }
        if msg.flags.replied {
            seqs.add_replied(n, n);
        }
    }
    text.push_str(&seqs.render(names));

    let tmp = mailbox.join(format!("{SEQUENCES_FILE}-{}", std::process::id()));
    std::fs::write(&tmp, text).map_err(|e| ScanError::io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| ScanError::io(&path, e))?;
    debug!(path = %path.display(), "Sequences written");
    Ok(())
}

/// Source of MH sequence data for a mailbox.
pub trait SequenceSource {
    fn read_sequences(&self, mailbox: &Path) -> Result<MhSequences>;
}

/// Reads `.mh_sequences` from the mailbox directory.
#[derive(Debug, Clone)]
pub struct MhSequenceFile {
    names: MhConfig,
}

impl MhSequenceFile {
    pub fn new(names: &MhConfig) -> Self {
        Self {
            names: names.clone(),
        }
    }
}

impl SequenceSource for MhSequenceFile {
    /// A missing file means no message is unseen, flagged or replied.
    fn read_sequences(&self, mailbox: &Path) -> Result<MhSequences> {
        let path = mailbox.join(SEQUENCES_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => MhSequences::parse(&String::from_utf8_lossy(&bytes), &self.names, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MhSequences::new()),
            Err(e) => Err(ScanError::io(path, e)),
        }
    }
}

/// Overwrite the read, flagged and replied state of every live entry with
/// what the sequences say.
pub fn apply_sequences(entries: &mut [PendingEntry], seqs: &MhSequences) {
    for msg in entries.iter_mut().filter_map(|e| e.message.as_mut()) {
        let Some(n) = msg.mh_number() else {
            continue;
        };
        let f = seqs.check(n);
        msg.flags.read = !f.unseen;
        msg.flags.flagged = f.flagged;
        msg.flags.replied = f.replied;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> MhConfig {
        MhConfig::default()
    }

    #[test]
    fn test_parse_sequences() {
        let text = "unseen: 3 5-7\nflagged: 4\ncur: 9\nreplied:\t1-2 4\n";
        let seqs = MhSequences::parse(text, &names(), Path::new(".mh_sequences")).unwrap();

        assert_eq!(
            seqs.check(5),
            SequenceFlags {
                unseen: true,
                flagged: false,
                replied: false
            }
        );
        assert!(seqs.check(4).flagged);
        assert!(seqs.check(4).replied);
        assert!(!seqs.check(4).unseen);
        assert_eq!(seqs.check(9), SequenceFlags::default());
        assert!(!seqs.check(8).unseen);
    }

    #[test]
    fn test_parse_custom_names() {
        let mut n = names();
        n.seq_unseen = "new".to_string();
        let seqs = MhSequences::parse("new: 1\nunseen: 2\n", &n, Path::new("x")).unwrap();
        assert!(seqs.check(1).unseen);
        assert!(!seqs.check(2).unseen);
    }

    #[test]
    fn test_parse_bad_token() {
        let err = MhSequences::parse("unseen: 1 x-3\n", &names(), Path::new("seq")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidSequences { .. }));

        // Malformed lines of unrelated sequences are never looked at.
        assert!(MhSequences::parse("cur: zz\n", &names(), Path::new("seq")).is_ok());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let seqs = MhSequenceFile::new(&names()).read_sequences(dir.path()).unwrap();
        assert!(seqs.is_empty());
    }

    #[test]
    fn test_render_merges_ranges() {
        let mut seqs = MhSequences::new();
        for n in [4, 1, 2, 3, 9] {
            seqs.add_unseen(n, n);
        }
        seqs.add_replied(5, 7);
        seqs.add_replied(6, 8);
        assert_eq!(seqs.render(&names()), "unseen: 1-4 9\nreplied: 5-8\n");
        assert_eq!(MhSequences::new().render(&names()), "");
    }

    #[test]
    fn test_write_sequences_keeps_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SEQUENCES_FILE);
        std::fs::write(&path, "cur: 1\nunseen: 1-3\nflagged: 1\n").unwrap();

        let mut one = Message::new("1");
        one.flags.read = true;
        let mut two = Message::new("2");
        two.flags.flagged = true;
        let three = Message::new("3");
        let mut five = Message::new("5");
        five.flags.replied = true;
        five.flags.deleted = true;

        let msgs = [one, two, three, five];
        write_sequences(dir.path(), &msgs, &names()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "cur: 1\nunseen: 2-3\nflagged: 2\n");

        let seqs = MhSequenceFile::new(&names()).read_sequences(dir.path()).unwrap();
        assert!(!seqs.check(1).unseen);
        assert!(seqs.check(2).flagged);
        assert!(!seqs.check(5).replied);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_apply_overrides_flags() {
        let mut seqs = MhSequences::new();
        seqs.add_unseen(2, 2);
        seqs.add_flagged(1, 1);

        let mut one = Message::new("1");
        one.flags.replied = true;
        let mut entries = vec![
            PendingEntry::new(1, one),
            PendingEntry::new(2, Message::new("2")),
            PendingEntry {
                inode: 3,
                message: None,
                parsed: false,
            },
        ];
        apply_sequences(&mut entries, &seqs);

        let m1 = entries[0].message.as_ref().unwrap();
        assert!(m1.flags.read);
        assert!(m1.flags.flagged);
        assert!(!m1.flags.replied);

        let m2 = entries[1].message.as_ref().unwrap();
        assert!(!m2.flags.read);
        assert!(entries[2].is_tombstone());
    }
}
