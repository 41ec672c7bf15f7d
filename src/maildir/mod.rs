//! Maildir and MH scanning.
//!
//! Reading a mailbox runs the same pipeline for both layouts:
//!
//! 1. [`enumerate::parse_dir`] lists the directory into a pending list.
//! 2. [`delayed::delayed_parsing`] sorts it by inode, drops duplicates and
//!    fills in headers from the cache or from disk.
//! 3. MH only: [`sequences::apply_sequences`], then natural order when
//!    `scan.sort = "order"`.
//! 4. [`assemble::move_to_mailbox`] appends the messages to the index.
//!
//! Flags changed through [`Mailbox::set_flags`] are written back by
//! [`sync_mailbox`].

pub mod assemble;
pub mod check;
pub mod delayed;
pub mod enumerate;
pub mod flags;
pub mod sequences;
pub mod sort;
pub mod stats;
pub mod sync;

use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, info};

use crate::cache::HeaderCache;
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::model::{Mailbox, MailboxKind};
use crate::parser::HeaderParser;
use enumerate::{Enumerated, PendingEntry};
use sequences::SequenceSource;

pub use check::{check_mailbox, CheckResult};
pub use stats::{mailbox_stats, MailboxStats};
pub use sync::{sync_mailbox, sync_message};

/// Files whose presence marks a directory as an MH folder.
const MH_MARKERS: [&str; 6] = [
    ".mh_sequences",
    ".xmhcache",
    ".mew_cache",
    ".mew-cache",
    ".sylpheed_cache",
    ".overview",
];

/// Result of a scan that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every entry was read.
    Complete { added: usize },
    /// The cancellation token fired during enumeration. The messages found
    /// before that point were still parsed and added.
    Aborted { added: usize },
}

impl ScanOutcome {
    pub fn added(&self) -> usize {
        match *self {
            ScanOutcome::Complete { added } | ScanOutcome::Aborted { added } => added,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ScanOutcome::Aborted { .. })
    }
}

/// Receives progress while a scan runs. `total` is `None` while the
/// directory is still being listed.
pub trait ProgressSink {
    fn update(&self, pos: usize, total: Option<usize>);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, Option<usize>),
{
    fn update(&self, pos: usize, total: Option<usize>) {
        self(pos, total)
    }
}

/// Everything a scan needs besides the mailbox itself.
pub struct ScanContext<'a> {
    pub config: &'a Config,
    pub cancel: &'a CancelToken,
    pub parser: &'a dyn HeaderParser,
    pub sequences: &'a dyn SequenceSource,
    pub cache: Option<&'a mut dyn HeaderCache>,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl<'a> ScanContext<'a> {
    pub fn new(
        config: &'a Config,
        cancel: &'a CancelToken,
        parser: &'a dyn HeaderParser,
        sequences: &'a dyn SequenceSource,
    ) -> Self {
        Self {
            config,
            cancel,
            parser,
            sequences,
            cache: None,
            progress: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a mut dyn HeaderCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Detect the layout of `path`: a `cur/` directory means Maildir, one of
/// the MH marker files means MH.
pub fn detect_kind(path: &Path) -> Option<MailboxKind> {
    if !path.is_dir() {
        return None;
    }
    if path.join("cur").is_dir() {
        return Some(MailboxKind::Maildir);
    }
    if MH_MARKERS.iter().any(|m| path.join(m).exists()) {
        return Some(MailboxKind::Mh);
    }
    None
}

/// Probe and read the mailbox at `path`.
pub fn open_mailbox(path: &Path, ctx: &mut ScanContext<'_>) -> Result<(Mailbox, ScanOutcome)> {
    let kind = detect_kind(path).ok_or_else(|| ScanError::NotAMailbox(path.to_path_buf()))?;
    let mut mailbox = Mailbox::new(path, kind);
    let outcome = load_mailbox(&mut mailbox, ctx)?;
    Ok((mailbox, outcome))
}

/// Read all messages of an empty [`Mailbox`]: `new/` then `cur/` for
/// Maildir, the folder itself for MH.
pub fn load_mailbox(mailbox: &mut Mailbox, ctx: &mut ScanContext<'_>) -> Result<ScanOutcome> {
    update_mtimes(mailbox);

    let outcome = match mailbox.kind {
        MailboxKind::Maildir => {
            let first = read_dir(mailbox, Some("new"), ctx)?;
            if first.is_aborted() {
                first
            } else {
                match read_dir(mailbox, Some("cur"), ctx)? {
                    ScanOutcome::Complete { added } => ScanOutcome::Complete {
                        added: first.added() + added,
                    },
                    ScanOutcome::Aborted { added } => ScanOutcome::Aborted {
                        added: first.added() + added,
                    },
                }
            }
        }
        MailboxKind::Mh => read_dir(mailbox, None, ctx)?,
    };

    info!(
        mailbox = %mailbox.path.display(),
        kind = %mailbox.kind,
        messages = mailbox.count(),
        aborted = outcome.is_aborted(),
        "Mailbox read"
    );
    Ok(outcome)
}

/// Run the scan pipeline over one directory and append the result to
/// `mailbox`.
pub fn read_dir(
    mailbox: &mut Mailbox,
    subdir: Option<&str>,
    ctx: &mut ScanContext<'_>,
) -> Result<ScanOutcome> {
    if ctx.cancel.take() {
        return Ok(ScanOutcome::Aborted { added: 0 });
    }

    let root = mailbox.path.clone();
    let mut entries: Vec<PendingEntry> = Vec::new();
    let enumerated = enumerate::parse_dir(&root, mailbox.kind, subdir, ctx, &mut entries)?;
    debug!(
        dir = %root.join(subdir.unwrap_or("")).display(),
        entries = entries.len(),
        "Directory listed"
    );

    delayed::delayed_parsing(&root, mailbox.kind, &mut entries, ctx);

    if mailbox.kind == MailboxKind::Mh {
        let seqs = ctx.sequences.read_sequences(&root)?;
        sequences::apply_sequences(&mut entries, &seqs);
        if ctx.config.scan.natural_order() {
            entries = sort::sort_by(entries, sort::by_path);
        }
    }

    let added = assemble::move_to_mailbox(mailbox, entries);
    Ok(match enumerated {
        Enumerated::Complete => ScanOutcome::Complete { added },
        Enumerated::Aborted => ScanOutcome::Aborted { added },
    })
}

pub(crate) fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remember the modification times that [`check_mailbox`] compares against.
pub(crate) fn update_mtimes(mailbox: &mut Mailbox) {
    match mailbox.kind {
        MailboxKind::Maildir => {
            mailbox.mtime = modified(&mailbox.path.join("new"));
            mailbox.mtime_cur = modified(&mailbox.path.join("cur"));
        }
        MailboxKind::Mh => {
            mailbox.mtime = modified(&mailbox.path);
            mailbox.mtime_cur = modified(&mailbox.path.join(sequences::SEQUENCES_FILE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_kind(dir.path()), None);

        std::fs::write(dir.path().join(".mh_sequences"), b"").unwrap();
        assert_eq!(detect_kind(dir.path()), Some(MailboxKind::Mh));

        std::fs::create_dir(dir.path().join("cur")).unwrap();
        assert_eq!(detect_kind(dir.path()), Some(MailboxKind::Maildir));

        assert_eq!(detect_kind(&dir.path().join("missing")), None);
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(ScanOutcome::Complete { added: 3 }.added(), 3);
        assert!(!ScanOutcome::Complete { added: 3 }.is_aborted());
        assert!(ScanOutcome::Aborted { added: 1 }.is_aborted());
    }

    #[test]
    fn test_closure_progress_sink() {
        let seen = std::cell::Cell::new(0);
        let sink = |pos: usize, _total: Option<usize>| seen.set(pos);
        let dyn_sink: &dyn ProgressSink = &sink;
        dyn_sink.update(4, Some(10));
        assert_eq!(seen.get(), 4);
    }
}
