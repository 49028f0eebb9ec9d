//! Shared helpers for offset-addressed reading and aligned writing

use std::io::Cursor;

use crate::error::{LmtError, Result};

/// Round `value` up to the next multiple of `amount`
pub fn align(value: u64, amount: u64) -> u64 {
    if amount <= 1 {
        return value;
    }
    value.div_ceil(amount) * amount
}

/// Zero-extend `out` until it is `len` bytes long
pub(crate) fn pad_to(out: &mut Vec<u8>, len: u64) {
    let len = len as usize;
    if out.len() < len {
        out.resize(len, 0);
    }
}

/// Checks that `size` bytes starting at the absolute `offset` lie within `data`
pub(crate) fn check_range(data: &[u8], offset: u64, size: u64, field: &'static str) -> Result<()> {
    let len = data.len() as u64;
    match offset.checked_add(size) {
        Some(end) if end <= len => Ok(()),
        _ => Err(LmtError::OffsetOutOfRange {
            field,
            offset,
            size,
            len,
        }),
    }
}

/// Returns a cursor positioned at `offset`, after checking `size` bytes are available there
pub(crate) fn cursor_at<'a>(
    data: &'a [u8],
    offset: u64,
    size: u64,
    field: &'static str,
) -> Result<Cursor<&'a [u8]>> {
    check_range(data, offset, size, field)?;
    let mut cursor = Cursor::new(data);
    cursor.set_position(offset);
    Ok(cursor)
}

/// Byte size of a table of `count` fixed-size records, rejecting overflow
pub(crate) fn table_size(
    count: u64,
    record_size: u64,
    field: &'static str,
    offset: u64,
) -> Result<u64> {
    count
        .checked_mul(record_size)
        .ok_or_else(|| LmtError::MalformedHeader {
            offset,
            reason: format!("{field} count {count} overflows the address space"),
        })
}

/// Borrow `size` bytes at `offset`, failing with `TruncatedBuffer` if they are not all there
pub(crate) fn slice_at<'a>(
    data: &'a [u8],
    offset: u64,
    size: u64,
    field: &'static str,
) -> Result<&'a [u8]> {
    let len = data.len() as u64;
    if offset > len {
        return Err(LmtError::OffsetOutOfRange {
            field,
            offset,
            size,
            len,
        });
    }
    let available = len - offset;
    if size > available {
        return Err(LmtError::TruncatedBuffer {
            field,
            offset,
            needed: size,
            available,
        });
    }
    Ok(&data[offset as usize..(offset + size) as usize])
}

/// Decoded bytes allowed per input byte before a parse is rejected
///
/// Tables may share data; the total decoded for one structure stays under this
/// multiple of the input size.
pub const DECODE_AMPLIFICATION_LIMIT: u64 = 4;

/// Running total of bytes materialized while decoding one structure
#[derive(Debug)]
pub(crate) struct DecodeBudget {
    remaining: u64,
    limit: u64,
}

impl DecodeBudget {
    pub(crate) fn for_input(data: &[u8]) -> Self {
        let limit = (data.len() as u64).saturating_mul(DECODE_AMPLIFICATION_LIMIT);
        Self {
            remaining: limit,
            limit,
        }
    }

    /// Account for `size` decoded bytes of `field` read at `offset`
    pub(crate) fn charge(&mut self, size: u64, field: &'static str, offset: u64) -> Result<()> {
        match self.remaining.checked_sub(size) {
            Some(remaining) => {
                self.remaining = remaining;
                Ok(())
            }
            None => Err(LmtError::MalformedHeader {
                offset,
                reason: format!(
                    "{field} would exceed the {}-byte decode limit; tables alias each other",
                    self.limit
                ),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align() {
        assert_eq!(align(0, 16), 0);
        assert_eq!(align(1, 16), 16);
        assert_eq!(align(16, 16), 16);
        assert_eq!(align(17, 8), 24);
        assert_eq!(align(6, 4), 8);
        assert_eq!(align(5, 1), 5);
    }

    #[test]
    fn test_pad_to_never_shrinks() {
        let mut out = vec![1, 2, 3];
        pad_to(&mut out, 2);
        assert_eq!(out, [1, 2, 3]);
        pad_to(&mut out, 5);
        assert_eq!(out, [1, 2, 3, 0, 0]);
    }

    #[test]
    fn test_decode_budget() {
        let data = [0u8; 10];
        let mut budget = DecodeBudget::for_input(&data);
        budget.charge(30, "table", 0).unwrap();
        budget.charge(10, "table", 0).unwrap();
        assert!(matches!(
            budget.charge(1, "table", 0x20),
            Err(LmtError::MalformedHeader { offset: 0x20, .. })
        ));
    }

    #[test]
    fn test_range_checks() {
        let data = [0u8; 32];
        assert!(check_range(&data, 16, 16, "test").is_ok());
        assert!(matches!(
            check_range(&data, 17, 16, "test"),
            Err(LmtError::OffsetOutOfRange { offset: 17, .. })
        ));
        assert!(matches!(
            check_range(&data, u64::MAX, 2, "test"),
            Err(LmtError::OffsetOutOfRange { .. })
        ));

        assert_eq!(
            slice_at(&data, 30, 2, "test").map(<[u8]>::len).ok(),
            Some(2)
        );
        assert!(matches!(
            slice_at(&data, 30, 4, "test"),
            Err(LmtError::TruncatedBuffer {
                needed: 4,
                available: 2,
                ..
            })
        ));
        assert!(matches!(
            slice_at(&data, 40, 1, "test"),
            Err(LmtError::OffsetOutOfRange { .. })
        ));
    }
}
