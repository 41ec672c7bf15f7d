//! Moving parsed entries into the mailbox index.

use tracing::debug;

use super::enumerate::PendingEntry;
use crate::model::Mailbox;

/// Append every live entry's message to `mailbox`, consuming the list.
/// Returns the number of messages added.
pub fn move_to_mailbox(mailbox: &mut Mailbox, entries: Vec<PendingEntry>) -> usize {
    let before = mailbox.count();
    for message in entries.into_iter().filter_map(|e| e.message) {
        debug!(path = %message.path, "Adding message");
        mailbox.push(message);
    }
    let added = mailbox.count() - before;
    if added > 0 {
        mailbox.update_counters();
    }
    added
}
