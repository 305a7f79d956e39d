//! Logging helpers for raw modem text.
//!
//! AT command responses are full of `\r\n` pairs and the occasional stray
//! control byte; logged verbatim they shred log readability. `escape_log`
//! folds a response into one printable line, capped so a runaway modem
//! dump cannot flood the log file.

/// Escape a string for single-line logging:
/// - `\r` / `\n` / `\t` become their two-character escapes
/// - backslash is doubled
/// - other control bytes are rendered as `\xNN`
///
/// Input longer than the preview cap is truncated with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 400; // a full CMGL page fits; anything longer is noise
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
