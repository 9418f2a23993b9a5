//! Windows-1252 encoding utilities for receipt printers
//!
//! Most western thermal printers ship with a single-byte code page
//! (WPC1252 / PC858). This module provides utilities for:
//! - Calculating printable string widths
//! - Truncating/padding strings to a column width
//! - Converting UTF-8 to Windows-1252 while preserving ESC/POS commands

use tracing::instrument;

/// Byte substituted for characters the code page cannot represent
const REPLACEMENT: u8 = b'?';

/// Encode a single character, falling back to `?` when unmappable
fn encode_char(c: char, out: &mut Vec<u8>) {
    if c.is_ascii() {
        out.push(c as u8);
        return;
    }
    let mut tmp = [0u8; 4];
    let (cow, _, had_errors) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut tmp));
    if had_errors {
        out.push(REPLACEMENT);
    } else {
        out.extend_from_slice(&cow);
    }
}

/// Get the printed width of a string
///
/// Windows-1252 is single-byte, so every character occupies one column.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column width
fn truncate_text(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to a specific column width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_text(s: &str, width: usize, align_right: bool) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return truncate_text(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Encode plain text to Windows-1252
pub fn encode_text(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        encode_char(c, &mut out);
    }
    out
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to Windows-1252
///
/// ASCII bytes (0x00-0x7F) pass through untouched, which protects
/// ESC/POS commands from being corrupted. Only runs of bytes >= 0x80 are
/// decoded as UTF-8 and re-encoded.
#[instrument(skip(bytes))]
pub fn convert_to_cp1252(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len());
    let mut buffer = Vec::new();

    for &b in bytes {
        if b < 128 {
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            buffer.push(b);
        }
    }
    flush_buffer(&mut buffer, &mut result);

    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to Windows-1252
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }
    let s = String::from_utf8_lossy(buffer);
    for c in s.chars() {
        encode_char(c, result);
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("café"), 4);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello world", 5), "hello");
        assert_eq!(truncate_text("crème brûlée", 5), "crème");
    }

    #[test]
    fn test_pad_text() {
        assert_eq!(pad_text("hi", 5, false), "hi   ");
        assert_eq!(pad_text("hi", 5, true), "   hi");
        assert_eq!(pad_text("hello world", 5, false), "hello");
    }

    #[test]
    fn test_convert_preserves_commands() {
        let mut input = vec![0x1B, 0x40];
        input.extend_from_slice("café €".as_bytes());
        let out = convert_to_cp1252(&input);
        assert_eq!(out, vec![0x1B, 0x40, b'c', b'a', b'f', 0xE9, b' ', 0x80]);
    }

    #[test]
    fn test_unmappable_becomes_question_mark() {
        assert_eq!(encode_text("茶 tea"), b"? tea".to_vec());
    }
}
