//! Picking up changes made to an open mailbox by other programs.

use std::collections::HashMap;

use tracing::{debug, info};

use super::enumerate::{Enumerated, PendingEntry};
use super::{assemble, delayed, enumerate, flags, modified, sequences, ScanContext};
use crate::error::Result;
use crate::model::{Mailbox, MailboxKind, Message};

/// What [`check_mailbox`] found, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckResult {
    /// Nothing changed on disk, or checking is disabled.
    Unchanged,
    /// The rescan was interrupted; the mailbox was left as it was.
    Aborted,
    /// Some messages changed flags.
    FlagsChanged,
    /// New messages were appended.
    NewMail,
    /// Messages disappeared and are marked for purging.
    Reopened,
}

/// Compare the mailbox with the disk and merge the differences.
///
/// Known messages get their new path and flags, vanished ones are marked
/// `deleted` and `purge`, new ones are parsed and appended. Messages
/// already marked `purge` are left alone.
pub fn check_mailbox(mailbox: &mut Mailbox, ctx: &mut ScanContext<'_>) -> Result<CheckResult> {
    if !ctx.config.scan.check_new {
        return Ok(CheckResult::Unchanged);
    }
    let result = match mailbox.kind {
        MailboxKind::Maildir => check_maildir(mailbox, ctx)?,
        MailboxKind::Mh => check_mh(mailbox, ctx)?,
    };
    if result > CheckResult::Aborted {
        mailbox.update_counters();
        info!(mailbox = %mailbox.path.display(), result = ?result, "Mailbox changed");
    }
    Ok(result)
}

fn check_maildir(mailbox: &mut Mailbox, ctx: &mut ScanContext<'_>) -> Result<CheckResult> {
    let root = mailbox.path.clone();
    let new_mtime = modified(&root.join("new"));
    let cur_mtime = modified(&root.join("cur"));
    let new_changed = new_mtime.is_none() || new_mtime > mailbox.mtime;
    let cur_changed = cur_mtime.is_none() || cur_mtime > mailbox.mtime_cur;
    if !new_changed && !cur_changed {
        return Ok(CheckResult::Unchanged);
    }

    let mut entries: Vec<PendingEntry> = Vec::new();
    for (sub, changed) in [("new", new_changed), ("cur", cur_changed)] {
        if changed
            && enumerate::parse_dir(&root, MailboxKind::Maildir, Some(sub), ctx, &mut entries)?
                == Enumerated::Aborted
        {
            return Ok(CheckResult::Aborted);
        }
    }
    if new_changed {
        mailbox.mtime = new_mtime;
    }
    if cur_changed {
        mailbox.mtime_cur = cur_mtime;
    }

    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        if let Some(path) = entry.path() {
            by_name
                .entry(flags::canonical_name(path).to_string())
                .or_insert(i);
        }
    }

    let flag_safe = ctx.config.scan.flag_safe;
    let mut flags_changed = false;
    let mut occult = false;

    for msg in mailbox.messages.iter_mut().filter(|m| !m.purge) {
        msg.active = false;
        let found = by_name
            .get(flags::canonical_name(&msg.path))
            .and_then(|&i| entries[i].message.take());

        if let Some(mut fresh) = found {
            msg.active = true;
            if flag_safe && msg.flags.flagged {
                flags::decode(&mut fresh, true);
            }
            if msg.path != fresh.path {
                debug!(from = %msg.path, to = %fresh.path, "Message moved");
                msg.path = std::mem::take(&mut fresh.path);
            }
            if !msg.changed && update_flags(msg, &fresh) {
                flags_changed = true;
            }
            if msg.flags.deleted == msg.flags.trashed && msg.flags.deleted != fresh.flags.deleted
            {
                msg.flags.deleted = fresh.flags.deleted;
                flags_changed = true;
            }
            msg.flags.trashed = fresh.flags.trashed;
            msg.maildir_flags = fresh.maildir_flags;
        } else if (cur_changed && msg.path.starts_with("cur/"))
            || (new_changed && msg.path.starts_with("new/"))
        {
            debug!(path = %msg.path, "Message vanished");
            occult = true;
            msg.flags.deleted = true;
            msg.purge = true;
        } else {
            // Lives in a directory that was not rescanned.
            msg.active = true;
        }
    }

    delayed::delayed_parsing(&root, MailboxKind::Maildir, &mut entries, ctx);
    let num_new = assemble::move_to_mailbox(mailbox, entries);

    Ok(summarize(occult, num_new, flags_changed))
}

fn check_mh(mailbox: &mut Mailbox, ctx: &mut ScanContext<'_>) -> Result<CheckResult> {
    let root = mailbox.path.clone();
    let dir_mtime = modified(&root);
    let seq_mtime = modified(&root.join(sequences::SEQUENCES_FILE));
    let changed = dir_mtime > mailbox.mtime || (seq_mtime.is_some() && seq_mtime > mailbox.mtime_cur);
    if !changed {
        return Ok(CheckResult::Unchanged);
    }

    let mut entries: Vec<PendingEntry> = Vec::new();
    if enumerate::parse_dir(&root, MailboxKind::Mh, None, ctx, &mut entries)? == Enumerated::Aborted
    {
        return Ok(CheckResult::Aborted);
    }
    mailbox.mtime = dir_mtime;
    mailbox.mtime_cur = seq_mtime;

    delayed::delayed_parsing(&root, MailboxKind::Mh, &mut entries, ctx);
    let seqs = ctx.sequences.read_sequences(&root)?;
    sequences::apply_sequences(&mut entries, &seqs);

    let mut by_path: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        if let Some(path) = entry.path() {
            by_path.entry(path.to_string()).or_insert(i);
        }
    }

    let mut flags_changed = false;
    let mut occult = false;

    for msg in mailbox.messages.iter_mut().filter(|m| !m.purge) {
        msg.active = false;
        let slot = by_path
            .get(&msg.path)
            .copied()
            .filter(|&i| entries[i].message.as_ref().is_some_and(|f| same_message(msg, f)));

        match slot.and_then(|i| entries[i].message.take()) {
            Some(fresh) => {
                msg.active = true;
                if update_flags(msg, &fresh) {
                    flags_changed = true;
                }
            }
            None => {
                debug!(path = %msg.path, "Message vanished");
                occult = true;
                msg.flags.deleted = true;
                msg.purge = true;
            }
        }
    }

    if ctx.config.scan.natural_order() {
        entries = super::sort::sort_by(entries, super::sort::by_path);
    }
    let num_new = assemble::move_to_mailbox(mailbox, entries);

    Ok(summarize(occult, num_new, flags_changed))
}

fn summarize(occult: bool, num_new: usize, flags_changed: bool) -> CheckResult {
    if occult {
        CheckResult::Reopened
    } else if num_new > 0 {
        CheckResult::NewMail
    } else if flags_changed {
        CheckResult::FlagsChanged
    } else {
        CheckResult::Unchanged
    }
}

/// Copy flagged, replied, read and old from `fresh`. Returns whether any
/// of them differed.
fn update_flags(msg: &mut Message, fresh: &Message) -> bool {
    let (old, new) = (&mut msg.flags, &fresh.flags);
    let differs = old.flagged != new.flagged
        || old.replied != new.replied
        || old.read != new.read
        || old.old != new.old;
    if differs {
        old.flagged = new.flagged;
        old.replied = new.replied;
        old.read = new.read;
        old.old = new.old;
    }
    differs
}

/// An MH file still holds the message we indexed under its number.
fn same_message(indexed: &Message, fresh: &Message) -> bool {
    indexed.envelope == fresh.envelope && indexed.date_sent == fresh.date_sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_priority() {
        assert_eq!(summarize(true, 3, true), CheckResult::Reopened);
        assert_eq!(summarize(false, 3, true), CheckResult::NewMail);
        assert_eq!(summarize(false, 0, true), CheckResult::FlagsChanged);
        assert_eq!(summarize(false, 0, false), CheckResult::Unchanged);
        assert!(CheckResult::Reopened > CheckResult::NewMail);
        assert!(CheckResult::NewMail > CheckResult::FlagsChanged);
    }

    #[test]
    fn test_update_flags() {
        let mut msg = Message::new("cur/1:2,S");
        msg.flags.read = true;
        let mut fresh = Message::new("cur/1:2,RS");
        fresh.flags.read = true;
        fresh.flags.replied = true;

        assert!(update_flags(&mut msg, &fresh));
        assert!(msg.flags.replied);
        assert!(!update_flags(&mut msg, &fresh));
    }
}
