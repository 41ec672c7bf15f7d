//! Message counts from directory listings alone, without parsing.

use std::path::Path;

use serde::Serialize;

use super::enumerate::is_mh_message_name;
use super::flags::flag_letters;
use super::sequences::SequenceSource;
use crate::error::{Result, ScanError};
use crate::model::MailboxKind;

/// Counts shown in a folder list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    pub count: usize,
    pub unread: usize,
    pub flagged: usize,
    /// Unread messages still in Maildir `new/`. Same as `unread` for MH.
    pub new: usize,
}

/// Count the messages of a mailbox. Trashed Maildir messages are left out.
pub fn mailbox_stats(
    path: &Path,
    kind: MailboxKind,
    sequences: &dyn SequenceSource,
) -> Result<MailboxStats> {
    let mut stats = MailboxStats::default();
    match kind {
        MailboxKind::Maildir => {
            count_maildir_dir(&path.join("new"), true, &mut stats)?;
            count_maildir_dir(&path.join("cur"), false, &mut stats)?;
        }
        MailboxKind::Mh => {
            let seqs = sequences.read_sequences(path)?;
            for name in dir_names(path)? {
                if !is_mh_message_name(&name) {
                    continue;
                }
                let Ok(n) = name.parse::<u32>() else {
                    continue;
                };
                stats.count += 1;
                let f = seqs.check(n);
                if f.unseen {
                    stats.unread += 1;
                    stats.new += 1;
                }
                if f.flagged {
                    stats.flagged += 1;
                }
            }
        }
    }
    Ok(stats)
}

fn count_maildir_dir(dir: &Path, is_new: bool, stats: &mut MailboxStats) -> Result<()> {
    for name in dir_names(dir)? {
        if name.starts_with('.') {
            continue;
        }
        let letters = flag_letters(&name).unwrap_or("");
        if letters.contains('T') {
            continue;
        }
        stats.count += 1;
        if letters.contains('F') {
            stats.flagged += 1;
        }
        if !letters.contains('S') {
            stats.unread += 1;
            if is_new {
                stats.new += 1;
            }
        }
    }
    Ok(())
}

fn dir_names(dir: &Path) -> Result<Vec<String>> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| ScanError::io(dir, e))?;
    Ok(read_dir
        .filter_map(|d| d.ok())
        .filter_map(|d| d.file_name().into_string().ok())
        .collect())
}
