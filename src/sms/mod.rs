//! # SMS Extraction Module
//!
//! Parses the raw text a cellular modem returns for an `AT+CMGL` list
//! command into discrete, timestamped messages. The list response
//! interleaves record headers with free-form bodies:
//!
//! ```text
//! +CMGL: 3,"REC UNREAD","+628115013798",,"25/04/29,08:00:42+28"
//! AIN0:21.5,Normal;AIN1:60.2,Normal;DIN0:1;
//! +CMGL: 4,"REC READ","+628115013798",,"25/04/29,09:00:40+28"
//! ...
//! ```
//!
//! The scanner is incremental and forgiving: unrelated lines (status
//! beacons from other device classes, `OK`/`ERROR` terminators, echoed
//! commands) are skipped, a malformed header orphans its body rather than
//! corrupting a neighbor, and a record only survives extraction when its
//! body carries at least one channel marker. Header order is preserved;
//! downstream filename ordering depends on it.

use log::{debug, warn};

use crate::logutil::escape_log;

/// One SMS record extracted from a modem list response.
///
/// `timestamp` is canonical `YYYY-MM-DD HH:MM:SS` when the modem-native
/// timestamp parsed cleanly, otherwise the original string is passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Originating sender address, e.g. `+628115013798`.
    pub identity: String,
    /// Canonical local timestamp (or raw passthrough on parse failure).
    pub timestamp: String,
    /// Message body with line endings normalized to `\n`, trimmed.
    pub body: String,
}

/// Record header fields recognized on a `+CMGL:` line.
struct RecordHeader {
    identity: String,
    native_timestamp: String,
}

const HEADER_PREFIX: &str = "+CMGL:";

/// Convert a modem-native timestamp into canonical local time.
///
/// Input shape is `YY/MM/DD,HH:MM:SS±O` where `±O` is the network's UTC
/// offset in quarter hours. The offset suffix is stripped and discarded —
/// field units report wall-clock time already, the suffix is network
/// metadata. `clock_offset_hours` corrects the gap between the modem's
/// network clock and gateway local time.
///
/// Never fails: any input that does not match the expected shape is
/// returned unchanged, and callers must tolerate the passthrough.
pub fn normalize_timestamp(raw: &str, clock_offset_hours: i64) -> String {
    match convert(raw, clock_offset_hours) {
        Some(canonical) => canonical,
        None => {
            debug!("Unparseable modem timestamp '{}', passing through", escape_log(raw));
            raw.to_string()
        }
    }
}

fn convert(raw: &str, clock_offset_hours: i64) -> Option<String> {
    // Fixed-width prefix: "YY/MM/DD,HH:MM:SS" is exactly 17 bytes.
    if raw.len() < 17 || !raw.is_char_boundary(17) {
        return None;
    }
    let (stamp, suffix) = raw.split_at(17);
    // Anything after the prefix must be a signed quarter-hour offset.
    if !suffix.is_empty() {
        let mut chars = suffix.chars();
        match chars.next() {
            Some('+') | Some('-') => {}
            _ => return None,
        }
        if !chars.clone().all(|c| c.is_ascii_digit()) || chars.next().is_none() {
            return None;
        }
    }
    let dt = chrono::NaiveDateTime::parse_from_str(stamp, "%y/%m/%d,%H:%M:%S").ok()?;
    let corrected = dt.checked_add_signed(chrono::Duration::hours(clock_offset_hours))?;
    Some(corrected.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Extract every well-formed sensor message from a raw modem response.
///
/// Records appear in header order. Records whose body lacks a channel
/// marker (pure status/heartbeat payloads) are silently dropped — that is
/// a content filter, not an error. Malformed headers and partial trailing
/// records are excluded the same way.
pub fn extract_messages(raw: &str, clock_offset_hours: i64) -> Vec<ParsedMessage> {
    let mut messages = Vec::new();
    if raw.is_empty() {
        return messages;
    }

    let mut current: Option<(RecordHeader, Vec<&str>)> = None;
    for line in raw.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(HEADER_PREFIX) {
            // A new header terminates the previous record, well-formed or not.
            if let Some((header, body_lines)) = current.take() {
                if let Some(msg) = finish_record(header, &body_lines, clock_offset_hours) {
                    messages.push(msg);
                }
            }
            match parse_header(line) {
                Some(header) => current = Some((header, Vec::new())),
                None => {
                    warn!("Skipping malformed CMGL header: {}", escape_log(line));
                }
            }
        } else if let Some((_, ref mut body_lines)) = current {
            body_lines.push(line);
        }
        // Lines before the first header are modem chatter; ignored.
    }
    if let Some((header, body_lines)) = current {
        if let Some(msg) = finish_record(header, &body_lines, clock_offset_hours) {
            messages.push(msg);
        }
    }
    messages
}

fn finish_record(
    header: RecordHeader,
    body_lines: &[&str],
    clock_offset_hours: i64,
) -> Option<ParsedMessage> {
    let body = body_lines.join("\n").trim().to_string();
    if !has_channel_marker(&body) {
        debug!(
            "Dropping non-sensor message from {} ({} byte body)",
            header.identity,
            body.len()
        );
        return None;
    }
    Some(ParsedMessage {
        timestamp: normalize_timestamp(&header.native_timestamp, clock_offset_hours),
        identity: header.identity,
        body,
    })
}

/// Parse one `+CMGL:` header line.
///
/// Expected shape: `+CMGL: <index>,"REC READ|REC UNREAD","<identity>",,"<timestamp>"`.
/// Both read states are accepted; the record index is not retained.
fn parse_header(line: &str) -> Option<RecordHeader> {
    let rest = line.strip_prefix(HEADER_PREFIX)?.trim_start();

    // Record index: one or more digits followed by a comma.
    let comma = rest.find(',')?;
    let (index, rest) = rest.split_at(comma);
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let rest = &rest[1..];

    let (state, rest) = take_quoted(rest)?;
    if state != "REC READ" && state != "REC UNREAD" {
        return None;
    }
    let rest = rest.strip_prefix(',')?;

    let (identity, rest) = take_quoted(rest)?;
    if identity.is_empty() || !identity.chars().all(|c| c == '+' || c.is_ascii_digit()) {
        return None;
    }
    // The alpha field between identity and timestamp is empty in list responses.
    let rest = rest.strip_prefix(",,")?;

    let (native_timestamp, _) = take_quoted(rest)?;
    if native_timestamp.is_empty() {
        return None;
    }

    Some(RecordHeader {
        identity: identity.to_string(),
        native_timestamp: native_timestamp.to_string(),
    })
}

/// Split a leading `"…"` field off `input`, returning (content, remainder).
fn take_quoted(input: &str) -> Option<(&str, &str)> {
    let inner = input.strip_prefix('"')?;
    let end = inner.find('"')?;
    Some((&inner[..end], &inner[end + 1..]))
}

/// A channel marker is `AIN` or `DIN` immediately followed by a digit and
/// a colon. Plain mentions of the letters (e.g. inside a status word) do
/// not count.
pub fn has_channel_marker(body: &str) -> bool {
    for prefix in ["AIN", "DIN"] {
        let mut search = body;
        while let Some(pos) = search.find(prefix) {
            let tail = &search[pos + prefix.len()..];
            let after_index = tail.trim_start_matches(|c: char| c.is_ascii_digit());
            if after_index.len() < tail.len() && after_index.starts_with(':') {
                return true;
            }
            search = tail;
        }
    }
    false
}
