//! RFC 5322 header reader: folding, encoded-words (RFC 2047), and dates.

use std::io::BufRead;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use tracing::debug;

use super::{HeaderParser, ParsedHeader};
use crate::error::{Result, ScanError};
use crate::model::Envelope;

/// Reads the header block line by line and stops at the first blank line;
/// the body is never read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc5322Parser;

impl HeaderParser for Rfc5322Parser {
    fn read_header(&self, path: &Path, reader: &mut dyn BufRead) -> Result<ParsedHeader> {
        let mut raw = Vec::new();
        let mut line = Vec::new();
        let mut offset: u64 = 0;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| ScanError::io(path, e))?;
            if n == 0 {
                break;
            }
            // A leading mbox separator is tolerated
            if offset == 0 && line.starts_with(b"From ") {
                offset += n as u64;
                continue;
            }
            offset += n as u64;
            if line == b"\n" || line == b"\r\n" {
                break;
            }
            raw.extend_from_slice(&line);
        }

        if offset == 0 {
            return Err(ScanError::invalid_header(path, "empty file"));
        }

        let text = decode_header_bytes(&raw);
        let headers = unfold_headers(&text);
        if headers.is_empty() {
            return Err(ScanError::invalid_header(path, "no header fields"));
        }

        let envelope = Envelope {
            from: get_header(&headers, "from")
                .map(decode_encoded_words)
                .unwrap_or_default(),
            subject: get_header(&headers, "subject")
                .map(decode_encoded_words)
                .unwrap_or_default(),
            message_id: get_header(&headers, "message-id")
                .map(extract_angle_bracket)
                .unwrap_or_default(),
            in_reply_to: get_header(&headers, "in-reply-to").map(extract_angle_bracket),
            references: get_header(&headers, "references")
                .map(extract_all_angle_brackets)
                .unwrap_or_default(),
        };

        let date_sent = get_header(&headers, "date").and_then(parse_date);
        // The date of a Received: trace field follows its last ';'
        let received = get_header(&headers, "received")
            .and_then(|v| v.rsplit_once(';'))
            .and_then(|(_, date)| parse_date(date));

        Ok(ParsedHeader {
            envelope,
            date_sent,
            received,
            body_offset: offset,
        })
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines with the field they continue.
///
/// Returns `(lowercase_name, value)` pairs. Lines that are neither a field
/// nor a continuation are dropped.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }
        result.push((name.to_ascii_lowercase(), value.trim().to_string()));
    }

    result
}

/// First value of a field (names are lowercase).
fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Decode RFC 2047 encoded-words in an unstructured value.
///
/// The value is handed to `mail-parser` as a `Subject:` field; if that
/// fails the raw text is kept.
pub fn decode_encoded_words(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }
    let fake_msg = format!("Subject: {value}\n\n");
    MessageParser::default()
        .parse(fake_msg.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .unwrap_or_else(|| value.to_string())
}

/// The first `<...>` token, or the trimmed value if there is none.
fn extract_angle_bracket(s: &str) -> String {
    extract_all_angle_brackets(s)
        .into_iter()
        .next()
        .unwrap_or_else(|| s.trim().to_string())
}

/// Every `<...>` token, in order.
fn extract_all_angle_brackets(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        result.push(remaining[start..=start + len].to_string());
        remaining = &remaining[start + len + 1..];
    }
    result
}

/// Parse a header date: RFC 2822, RFC 3339, a few common broken forms,
/// then whatever `mail-parser` accepts.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let candidate = replace_named_tz(strip_day_of_week(trimmed));
    const FORMATS: [&str; 4] = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip a leading day-of-week ("Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim_start();
        }
    }
    s
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const ZONES: [(&str, &str); 10] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
    ];
    for (name, offset) in ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> Result<ParsedHeader> {
        let mut reader = input;
        Rfc5322Parser.read_header(Path::new("test"), &mut reader)
    }

    #[test]
    fn test_read_header_basic() {
        let msg = b"From: Alice <alice@example.com>\r\n\
Subject: Hello\r\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <m1@example.com>\r\n\
\r\n\
Body text\r\n";
        let parsed = parse(msg).unwrap();
        assert_eq!(parsed.envelope.from, "Alice <alice@example.com>");
        assert_eq!(parsed.envelope.subject, "Hello");
        assert_eq!(parsed.envelope.message_id, "<m1@example.com>");
        assert_eq!(
            parsed.date_sent.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-01-04".to_string())
        );
        assert_eq!(parsed.received, None);
        let body_start = msg.len() - b"Body text\r\n".len();
        assert_eq!(parsed.body_offset, body_start as u64);
    }

    #[test]
    fn test_read_header_received_and_refs() {
        let msg = b"Received: from mx.example.com by mail.example.org;\n\
\tFri, 05 Jan 2024 08:30:00 +0100\n\
Received: from older; Mon, 01 Jan 2024 00:00:00 +0000\n\
In-Reply-To: <parent@x>\n\
References: <a@x> <b@x>\n\
Subject: =?UTF-8?B?SG9sYSBtdW5kbw==?=\n\
\n";
        let parsed = parse(msg).unwrap();
        assert_eq!(
            parsed.received.map(|d| d.to_rfc3339()),
            Some("2024-01-05T07:30:00+00:00".to_string())
        );
        assert_eq!(parsed.envelope.in_reply_to.as_deref(), Some("<parent@x>"));
        assert_eq!(parsed.envelope.references, vec!["<a@x>", "<b@x>"]);
        assert_eq!(parsed.envelope.subject, "Hola mundo");
        assert_eq!(parsed.body_offset, msg.len() as u64);
    }

    #[test]
    fn test_read_header_skips_mbox_separator() {
        let msg = b"From alice@example.com Thu Jan  4 10:00:00 2024\nSubject: x\n\nbody";
        let parsed = parse(msg).unwrap();
        assert_eq!(parsed.envelope.subject, "x");
    }

    #[test]
    fn test_read_header_rejects_garbage() {
        assert!(matches!(parse(b""), Err(ScanError::InvalidHeader { .. })));
        assert!(matches!(
            parse(b"just some text\nwithout any fields\n"),
            Err(ScanError::InvalidHeader { .. })
        ));
        assert!(matches!(parse(b"\nSubject: late\n"), Err(ScanError::InvalidHeader { .. })));
    }

    #[test]
    fn test_read_header_latin1_bytes() {
        let parsed = parse(b"Subject: caf\xe9\n\n").unwrap();
        assert_eq!(parsed.envelope.subject, "café");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "subject");
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_decode_encoded_words() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
        assert_eq!(decode_encoded_words("plain text"), "plain text");
    }

    #[test]
    fn test_parse_date_variants() {
        for input in [
            "Thu, 04 Jan 2024 10:00:00 +0000",
            "04 Jan 2024 10:00:00 +0000",
            "Thu, 04 Jan 2024 10:00:00 EST",
            "2024-01-04T10:00:00Z",
            "2024-01-04 10:00:00",
        ] {
            assert!(parse_date(input).is_some(), "failed: {input}");
        }
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_extract_angle_brackets() {
        assert_eq!(extract_angle_bracket(" <msg001@example.com> "), "<msg001@example.com>");
        assert_eq!(extract_angle_bracket("bare-id"), "bare-id");
        assert_eq!(extract_all_angle_brackets("<a@b.com> <c@d.com> <e").len(), 2);
    }
}
