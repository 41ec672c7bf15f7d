//! Writing locally changed flags back to disk.
//!
//! A Maildir message carries its flags in its filename, so syncing it is a
//! rename. MH flags live in `.mh_sequences`, which is rewritten as a whole.

use std::path::Path;

use tracing::{debug, info};

use super::{flags, sequences, update_mtimes};
use crate::config::MhConfig;
use crate::error::{Result, ScanError};
use crate::model::{Mailbox, MailboxKind, Message};

/// Rename a Maildir message so its filename matches its flags.
///
/// The base name (everything before the first `:`) is kept. The message
/// goes to `cur/` once it is read or old, `new/` otherwise. Preserved
/// unknown letters are written back. Returns whether the file was renamed.
pub fn sync_message(root: &Path, msg: &mut Message) -> Result<bool> {
    let name = msg.file_name();
    let base = name.split_once(':').map_or(name, |(base, _)| base);
    let subdir = if msg.flags.read || msg.flags.old {
        "cur"
    } else {
        "new"
    };
    let target = format!("{subdir}/{base}{}", flags::encode(msg));

    if target == msg.path {
        msg.changed = false;
        return Ok(false);
    }

    let from = root.join(&msg.path);
    std::fs::rename(&from, root.join(&target)).map_err(|e| ScanError::io(&from, e))?;
    debug!(from = %msg.path, to = %target, "Message renamed");

    // The file now says T exactly when the message is deleted.
    msg.flags.trashed = msg.flags.deleted;
    msg.path = target;
    msg.changed = false;
    Ok(true)
}

/// Write back every message marked `changed`. Returns how many were
/// written.
///
/// Purged messages are skipped. Afterwards the recorded modification times
/// are refreshed so the next check does not see our own writes.
pub fn sync_mailbox(mailbox: &mut Mailbox, names: &MhConfig) -> Result<usize> {
    let root = mailbox.path().to_path_buf();

    let synced = match mailbox.kind {
        MailboxKind::Maildir => {
            let mut renamed = 0;
            for msg in mailbox
                .messages
                .iter_mut()
                .filter(|m| m.changed && !m.purge)
            {
                if sync_message(&root, msg)? {
                    renamed += 1;
                }
            }
            renamed
        }
        MailboxKind::Mh => {
            let changed = mailbox.messages.iter().filter(|m| m.changed).count();
            if changed > 0 {
                sequences::write_sequences(&root, mailbox.messages.iter(), names)?;
                for msg in mailbox.messages.iter_mut() {
                    msg.changed = false;
                }
            }
            changed
        }
    };

    if synced > 0 {
        update_mtimes(mailbox);
        info!(mailbox = %root.display(), synced, "Flags written back");
    }
    Ok(synced)
}
