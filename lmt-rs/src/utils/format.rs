//! Formatting utilities

use humansize::{DECIMAL, format_size};

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format an absolute offset, with `-` for "absent"
pub fn format_offset(offset: u64) -> String {
    if offset == 0 {
        "-".to_string()
    } else {
        format!("{offset:#x}")
    }
}

/// Format an 8-byte type tag as text when printable, hex otherwise
pub fn format_type_tag(tag: &[u8; 8]) -> String {
    let trimmed: &[u8] = match tag.iter().rposition(|&b| b != 0) {
        Some(last) => &tag[..=last],
        None => &[],
    };
    if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_graphic()) {
        String::from_utf8_lossy(trimmed).into_owned()
    } else {
        tag.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Format a float for tables
pub fn format_component(value: f32) -> String {
    format!("{value:.4}")
}
