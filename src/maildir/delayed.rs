//! Incremental header parsing of the pending list.
//!
//! Entries already parsed (from an earlier pass over the same list) and
//! tombstones are skipped without touching the disk. The first time an
//! unresolved entry is met, the rest of the list is sorted by inode and
//! adjacent duplicates are dropped. Every unresolved entry is then taken
//! from the header cache when the cached copy is still valid, or parsed
//! from its file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use tracing::{debug, warn};

use super::enumerate::PendingEntry;
use super::{flags, sort, ScanContext};
use crate::cache::cache_key;
use crate::error::{Result, ScanError};
use crate::model::{MailboxKind, Message};
use crate::parser::HeaderParser;

#[derive(Debug, Default)]
struct Tally {
    cached: usize,
    parsed: usize,
    discarded: usize,
}

/// Resolve every unparsed entry of `entries`.
///
/// Never fails: a message that can't be read or parsed is logged and
/// turned into a tombstone.
pub fn delayed_parsing(
    root: &Path,
    kind: MailboxKind,
    entries: &mut Vec<PendingEntry>,
    ctx: &mut ScanContext<'_>,
) {
    let total = entries.len();
    let progress = ctx.progress.filter(|_| ctx.config.scan.verbose);
    let mut tally = Tally::default();
    let mut sorted = false;
    let mut i = 0;

    while i < entries.len() {
        let entry = &entries[i];
        if !entry.parsed && !entry.is_tombstone() {
            if !sorted {
                let tail = entries.split_off(i);
                entries.extend(sort::sort_by(tail, sort::by_inode));
                tally.discarded += collapse_duplicates(&mut entries[i..]);
                sorted = true;
                // Slot `i` may now hold a different entry.
                continue;
            }
            resolve(root, kind, &mut entries[i], ctx, &mut tally);
        }

        i += 1;
        if let Some(p) = progress {
            p.update(i, Some(total));
        }
    }

    debug!(
        mailbox = %root.display(),
        cached = tally.cached,
        parsed = tally.parsed,
        discarded = tally.discarded,
        "Delayed parsing done"
    );
}

/// Tombstone live entries whose inode equals the previous live entry's.
/// Returns the number of entries dropped.
///
/// Only neighbours are compared: two names for one file that are not next
/// to each other after sorting both survive.
fn collapse_duplicates(entries: &mut [PendingEntry]) -> usize {
    let mut dropped = 0;
    let mut prev: Option<u64> = None;
    for entry in entries.iter_mut().filter(|e| !e.is_tombstone()) {
        if entry.inode != 0 && prev == Some(entry.inode) {
            debug!(path = ?entry.path(), inode = entry.inode, "Dropping duplicate entry");
            entry.discard();
            dropped += 1;
            continue;
        }
        prev = Some(entry.inode);
    }
    dropped
}

fn resolve(
    root: &Path,
    kind: MailboxKind,
    entry: &mut PendingEntry,
    ctx: &mut ScanContext<'_>,
    tally: &mut Tally,
) {
    let Some(msg) = entry.message.as_mut() else {
        return;
    };
    let file = root.join(&msg.path);
    let key = cache_key(kind, &msg.path).to_string();

    if let Some(cache) = ctx.cache.as_mut() {
        if let Some(cached) = cache.fetch(&key) {
            if !ctx.config.header_cache.verify || is_fresh(&file, cached.validity) {
                adopt_cached(msg, cached.message, kind, &file);
                entry.parsed = true;
                tally.cached += 1;
                return;
            }
            debug!(path = %file.display(), "Header cache entry is stale");
        }
    }

    match parse_message(&file, kind, msg, ctx.parser) {
        Ok(()) => {
            entry.parsed = true;
            tally.parsed += 1;
            if let Some(cache) = ctx.cache.as_mut() {
                if let Err(e) = cache.store(&key, msg) {
                    warn!(path = %file.display(), error = %e, "Could not cache header");
                }
            }
        }
        Err(e) => {
            debug!(path = %file.display(), error = %e, "Discarding unparseable message");
            entry.discard();
            tally.discarded += 1;
        }
    }
}

/// The file was not modified after the cache entry was written.
fn is_fresh(file: &Path, validity: u32) -> bool {
    std::fs::metadata(file)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .is_some_and(|d| d.as_secs() <= u64::from(validity))
}

/// Take the cached metadata, keeping what the directory scan just found:
/// the path and the `old` bit. Size and Maildir flags are re-read.
fn adopt_cached(msg: &mut Message, cached: Message, kind: MailboxKind, file: &Path) {
    let old = msg.flags.old;
    let path = std::mem::take(&mut msg.path);

    *msg = cached;
    msg.path = path;
    msg.flags.old = old;
    msg.index = None;
    if let Ok(meta) = std::fs::metadata(file) {
        msg.size = meta.len();
    }
    if kind == MailboxKind::Maildir {
        flags::decode(msg, false);
    }
}

/// Read the header of `file` into `msg`.
///
/// For Maildir the filename stays authoritative for the flags.
pub fn parse_message(
    file: &Path,
    kind: MailboxKind,
    msg: &mut Message,
    parser: &dyn HeaderParser,
) -> Result<()> {
    let handle = File::open(file).map_err(|e| ScanError::io(file, e))?;
    let meta = handle.metadata().map_err(|e| ScanError::io(file, e))?;
    let mut reader = BufReader::new(handle);
    let header = parser.read_header(file, &mut reader)?;

    msg.envelope = header.envelope;
    msg.date_sent = header.date_sent.unwrap_or(DateTime::UNIX_EPOCH);
    msg.received = header.received.unwrap_or(msg.date_sent);
    msg.body_offset = header.body_offset;
    msg.size = meta.len();
    msg.index = None;

    if kind == MailboxKind::Maildir {
        flags::decode(msg, false);
    }
    Ok(())
}
