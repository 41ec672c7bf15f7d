//! Maildir filename flags: the `:2,` suffix.
//!
//! A delivered message is named `<unique>:2,<letters>`. The letters we know
//! are `F` (flagged), `R` (replied), `S` (seen) and `T` (trashed). Anything
//! else is kept verbatim in [`Message::maildir_flags`] so that a rename
//! writes it back unchanged.

use crate::model::Message;

/// Marker that introduces the flag letters, after the last `:`.
const INFO_PREFIX: &str = "2,";

/// Letters with a meaning, in the order they are written.
const KNOWN: [char; 4] = ['F', 'R', 'S', 'T'];

/// Decode the flag suffix of `msg.path` into `msg.flags`.
///
/// The filename is the only source of truth: `read`, `replied`, `flagged`,
/// `trashed` and `deleted` are reset before the letters are applied, `old`
/// is left alone.
///
/// With `protect_flagged` set, a `T` is ignored and the message stays
/// flagged. Callers pass `flag_safe && <flagged in the index>`.
pub fn decode(msg: &mut Message, protect_flagged: bool) {
    msg.flags.flagged = false;
    msg.flags.read = false;
    msg.flags.replied = false;
    msg.flags.trashed = false;
    msg.flags.deleted = false;
    msg.maildir_flags = None;

    let Some(letters) = flag_letters(&msg.path) else {
        return;
    };

    let mut extra = String::new();
    for c in letters.chars() {
        match c {
            'F' => msg.flags.flagged = true,
            'R' => msg.flags.replied = true,
            'S' => msg.flags.read = true,
            'T' => {
                if protect_flagged {
                    msg.flags.flagged = true;
                } else {
                    msg.flags.trashed = true;
                    msg.flags.deleted = true;
                }
            }
            other => extra.push(other),
        }
    }

    if !extra.is_empty() {
        msg.maildir_flags = Some(extra);
    }
}

/// The letter run of a filename, if it carries a `:2,` suffix.
pub fn flag_letters(path: &str) -> Option<&str> {
    let (_, info) = path.rsplit_once(':')?;
    info.strip_prefix(INFO_PREFIX)
}

/// Build the `:2,<letters>` suffix for a message.
///
/// Known letters are merged with the preserved ones by character order.
/// The preserved letters keep their relative order, so a sorted set of
/// letters comes out sorted. Returns an empty string when no flag is set,
/// the message is new, and there is nothing to preserve.
pub fn encode(msg: &Message) -> String {
    let f = &msg.flags;
    let extra = msg.maildir_flags.as_deref().unwrap_or("");
    if !(f.flagged || f.replied || f.read || f.deleted || f.old || !extra.is_empty()) {
        return String::new();
    }

    let set = [f.flagged, f.replied, f.read, f.deleted];
    let mut known = KNOWN
        .iter()
        .zip(set)
        .filter_map(|(&c, on)| on.then_some(c))
        .peekable();
    let mut extra = extra.chars().peekable();

    let mut out = String::from(":");
    out.push_str(INFO_PREFIX);
    loop {
        let take_known = match (known.peek(), extra.peek()) {
            (Some(k), Some(e)) => k <= e,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_known { known.next() } else { extra.next() };
        out.extend(next);
    }
    out
}

/// Filename with the flag suffix removed: the last path component cut at
/// the first `,` or `:`.
///
/// Identifies a message across a move from `new/` to `cur/` and across
/// flag changes.
pub fn canonical_name(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.find([',', ':']) {
        Some(pos) => &name[..pos],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(path: &str, protect: bool) -> Message {
        let mut msg = Message::new(path);
        decode(&mut msg, protect);
        msg
    }

    #[test]
    fn test_decode_known_letters() {
        let msg = decoded("cur/1001:2,FRS", false);
        assert!(msg.flags.flagged);
        assert!(msg.flags.replied);
        assert!(msg.flags.read);
        assert!(!msg.flags.trashed);
        assert_eq!(msg.maildir_flags, None);
    }

    #[test]
    fn test_decode_trash_sets_deleted() {
        let msg = decoded("cur/1002:2,T", false);
        assert!(msg.flags.trashed);
        assert!(msg.flags.deleted);
    }

    #[test]
    fn test_flag_safe_protects_flagged() {
        let msg = decoded("cur/1002:2,FT", true);
        assert!(msg.flags.flagged);
        assert!(!msg.flags.trashed);
        assert!(!msg.flags.deleted);

        // Even without an F in the name, a protected message stays flagged.
        let msg = decoded("cur/1002:2,ST", true);
        assert!(msg.flags.flagged);
        assert!(msg.flags.read);
        assert!(!msg.flags.deleted);
    }

    #[test]
    fn test_unknown_letters_preserved_in_order() {
        let msg = decoded("new/x.host:2,zFaSb", false);
        assert_eq!(msg.maildir_flags.as_deref(), Some("zab"));
        assert!(msg.flags.flagged);
        assert!(msg.flags.read);
    }

    #[test]
    fn test_no_marker_means_no_flags() {
        for path in ["cur/1003", "cur/1003:1,S", "new/abc:2", "cur/odd:2,S:x"] {
            let msg = decoded(path, false);
            assert_eq!(msg.flags, Default::default(), "{path}");
            assert_eq!(msg.maildir_flags, None, "{path}");
        }
    }

    #[test]
    fn test_empty_flag_run() {
        let msg = decoded("cur/1003:2,", false);
        assert!(!msg.flags.read);
        assert_eq!(msg.maildir_flags, None);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let mut msg = Message::new("cur/42:2,aFxTq");
        decode(&mut msg, false);
        let once = msg.clone();
        decode(&mut msg, false);
        assert_eq!(msg, once);
    }

    #[test]
    fn test_decode_resets_previous_state() {
        let mut msg = Message::new("cur/42:2,ST");
        decode(&mut msg, false);
        assert!(msg.flags.deleted);

        msg.path = "cur/42:2,".to_string();
        decode(&mut msg, false);
        assert!(!msg.flags.read);
        assert!(!msg.flags.deleted);
        assert!(!msg.flags.trashed);
    }

    #[test]
    fn test_decode_keeps_old() {
        let mut msg = Message::new("cur/1:2,S");
        msg.flags.old = true;
        decode(&mut msg, false);
        assert!(msg.flags.old);
    }

    #[test]
    fn test_encode() {
        let mut msg = Message::new("cur/1");
        assert_eq!(encode(&msg), "");

        msg.flags.old = true;
        assert_eq!(encode(&msg), ":2,");

        msg.flags.read = true;
        msg.flags.flagged = true;
        msg.flags.deleted = true;
        assert_eq!(encode(&msg), ":2,FST");
    }

    #[test]
    fn test_encode_merges_preserved_letters() {
        let mut msg = Message::new("cur/1:2,Sab");
        decode(&mut msg, false);
        assert_eq!(encode(&msg), ":2,Sab");

        // Preserved letters keep their own order.
        let mut msg = Message::new("cur/1:2,zSa");
        decode(&mut msg, false);
        let suffix = encode(&msg);
        assert_eq!(suffix, ":2,Sza");
        let extras: String = suffix[3..].chars().filter(|c| !KNOWN.contains(c)).collect();
        assert_eq!(extras, "za");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut msg = Message::new("cur/77:2,DFPRS");
        decode(&mut msg, false);
        let renamed = format!("cur/77{}", encode(&msg));
        assert_eq!(renamed, "cur/77:2,DFPRS");

        let mut again = Message::new(renamed);
        decode(&mut again, false);
        assert_eq!(again.flags, msg.flags);
        assert_eq!(again.maildir_flags, msg.maildir_flags);
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("cur/1001.host:2,S"), "1001.host");
        assert_eq!(canonical_name("new/1001.host"), "1001.host");
        assert_eq!(canonical_name("1001.host,S=1234:2,S"), "1001.host");
        assert_eq!(canonical_name("plain"), "plain");
    }
}
