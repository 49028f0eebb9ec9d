//! Bit-level quantizer over fixed-width storage elements
//!
//! Quantized keyframes pack several narrow fields into one or more little-endian
//! storage elements (8, 16, 32 or 64 bits wide). Fields are consumed from the low
//! bits of the current element upward. When a field straddles an element boundary,
//! the bits still left in the current element become the *high* part of the value
//! and the low bits of the following element are appended below them.
//!
//! [`BitReader`] and [`BitWriter`] are exact inverses of each other under that rule.

use crate::error::{LmtError, Result};

/// Largest field width a single take/put can handle
pub const MAX_FIELD_BITS: u32 = 64;

/// Linear rescale applied to a raw field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// Raw integer, no rescale
    Raw,
    /// `raw / (2^n - 1)`, giving `[0, 1]`
    Unsigned,
    /// Sign-biased: values above half the range wrap negative, then divide by half the range
    Signed,
}

impl Scale {
    /// Map a raw `bits`-wide integer to its scaled value
    pub fn normalize(self, raw: u64, bits: u32) -> f64 {
        let max = low_mask(bits);
        match self {
            Self::Raw => raw as f64,
            Self::Unsigned => raw as f64 / max as f64,
            Self::Signed => {
                let half = max >> 1;
                let mut value = raw as f64;
                if raw > half {
                    value -= max as f64;
                }
                value / half as f64
            }
        }
    }

    /// Map a scaled value back to the nearest raw `bits`-wide integer
    pub fn quantize(self, value: f64, bits: u32) -> u64 {
        let max = low_mask(bits);
        match self {
            Self::Raw => value.round().clamp(0.0, max as f64) as u64,
            Self::Unsigned => (value.clamp(0.0, 1.0) * max as f64).round() as u64,
            Self::Signed => {
                let half = max >> 1;
                let q = (value.clamp(-1.0, 1.0) * half as f64).round() as i64;
                if q < 0 {
                    (q + max as i64) as u64
                } else {
                    q as u64
                }
            }
        }
    }
}

/// Mask with the low `bits` bits set
pub(crate) const fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

fn check_field_width(bits: u32) -> Result<()> {
    if bits == 0 || bits > MAX_FIELD_BITS {
        return Err(LmtError::ValueOutOfRange {
            field: "bit field width",
            value: bits as u64,
            max: MAX_FIELD_BITS as u64,
        });
    }
    Ok(())
}

/// Width of one little-endian storage element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageWidth {
    W8,
    W16,
    W32,
    W64,
}

impl StorageWidth {
    pub const ALL: [Self; 4] = [Self::W8, Self::W16, Self::W32, Self::W64];

    pub const fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    pub const fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// Split little-endian bytes into storage elements
fn elements_from_le_bytes(bytes: &[u8], width: StorageWidth) -> Vec<u64> {
    bytes
        .chunks(width.bytes())
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i)))
        })
        .collect()
}

/// Cursor reading arbitrary-width fields out of a sequence of storage elements
#[derive(Debug, Clone)]
pub struct BitReader {
    elements: Vec<u64>,
    width: u32,
    index: usize,
    consumed: u32,
}

impl BitReader {
    /// Create a reader over already-decoded storage elements
    pub fn new(elements: Vec<u64>, width: StorageWidth) -> Self {
        Self {
            elements,
            width: width.bits(),
            index: 0,
            consumed: 0,
        }
    }

    /// Create a reader over little-endian bytes grouped into `width` elements
    pub fn from_le_bytes(bytes: &[u8], width: StorageWidth) -> Self {
        Self::new(elements_from_le_bytes(bytes, width), width)
    }

    /// Number of bits not yet consumed
    pub fn remaining(&self) -> u64 {
        let whole = self.elements.len().saturating_sub(self.index) as u64;
        (whole * self.width as u64).saturating_sub(self.consumed as u64)
    }

    fn ensure_available(&self, bits: u64) -> Result<()> {
        let available = self.remaining();
        if bits > available {
            return Err(LmtError::TruncatedBuffer {
                field: "bitstream",
                offset: self.position(),
                needed: bits,
                available,
            });
        }
        Ok(())
    }

    /// Bit position of the cursor from the start of the stream
    pub fn position(&self) -> u64 {
        self.index as u64 * self.width as u64 + self.consumed as u64
    }

    /// Read the next `bits` bits without advancing
    pub fn peek_raw(&self, bits: u32) -> Result<u64> {
        check_field_width(bits)?;
        self.ensure_available(bits as u64)?;

        let mut value: u128 = 0;
        let mut left = bits;
        let mut index = self.index;
        let mut shift = self.consumed;
        while left > 0 {
            let take = (self.width - shift).min(left);
            let chunk = (self.elements[index] >> shift) & low_mask(take);
            value = (value << take) | u128::from(chunk);
            left -= take;
            index += 1;
            shift = 0;
        }
        Ok(value as u64)
    }

    /// Advance the cursor by `bits` bits
    pub fn skip_bits(&mut self, bits: u64) -> Result<()> {
        self.ensure_available(bits)?;
        let total = self.consumed as u64 + bits;
        self.index += (total / self.width as u64) as usize;
        self.consumed = (total % self.width as u64) as u32;
        Ok(())
    }

    /// Read and consume the next `bits` bits as a raw integer
    pub fn take_raw(&mut self, bits: u32) -> Result<u64> {
        let value = self.peek_raw(bits)?;
        self.skip_bits(bits as u64)?;
        Ok(value)
    }

    /// Read and consume the next `bits` bits, applying `scale`
    pub fn take_bits(&mut self, bits: u32, scale: Scale) -> Result<f64> {
        let raw = self.take_raw(bits)?;
        Ok(scale.normalize(raw, bits))
    }
}

/// Cursor writing arbitrary-width fields into a sequence of storage elements
#[derive(Debug, Clone)]
pub struct BitWriter {
    elements: Vec<u64>,
    width: u32,
    index: usize,
    filled: u32,
}

impl BitWriter {
    /// Create a writer over `element_count` zeroed elements
    pub fn new(element_count: usize, width: StorageWidth) -> Self {
        Self {
            elements: vec![0; element_count],
            width: width.bits(),
            index: 0,
            filled: 0,
        }
    }

    /// Number of bits that can still be written
    pub fn remaining(&self) -> u64 {
        let whole = self.elements.len().saturating_sub(self.index) as u64;
        (whole * self.width as u64).saturating_sub(self.filled as u64)
    }

    /// Append `value` as a `bits`-wide field
    pub fn put_raw(&mut self, value: u64, bits: u32) -> Result<()> {
        check_field_width(bits)?;
        let max = low_mask(bits);
        if value > max {
            return Err(LmtError::ValueOutOfRange {
                field: "bit field",
                value,
                max,
            });
        }
        let available = self.remaining();
        if bits as u64 > available {
            return Err(LmtError::TruncatedBuffer {
                field: "bitstream",
                offset: self.index as u64 * self.width as u64 + self.filled as u64,
                needed: bits as u64,
                available,
            });
        }

        let mut left = bits;
        while left > 0 {
            let take = (self.width - self.filled).min(left);
            let chunk = (value >> (left - take)) & low_mask(take);
            self.elements[self.index] |= chunk << self.filled;
            self.filled += take;
            left -= take;
            if self.filled == self.width {
                self.index += 1;
                self.filled = 0;
            }
        }
        Ok(())
    }

    /// Quantize `value` with `scale` and append it as a `bits`-wide field
    pub fn put_bits(&mut self, value: f64, bits: u32, scale: Scale) -> Result<()> {
        check_field_width(bits)?;
        self.put_raw(scale.quantize(value, bits), bits)
    }

    /// The storage elements written so far
    pub fn into_elements(self) -> Vec<u64> {
        self.elements
    }

    /// The storage elements as little-endian bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let step = (self.width / 8) as usize;
        let mut out = Vec::with_capacity(self.elements.len() * step);
        for element in &self.elements {
            out.extend_from_slice(&element.to_le_bytes()[..step]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fields_come_from_low_bits_first() {
        let mut reader = BitReader::new(vec![0b1011_0110], StorageWidth::W8);
        assert_eq!(reader.take_raw(3).unwrap(), 0b110);
        assert_eq!(reader.take_raw(5).unwrap(), 0b10110);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_straddling_field_puts_current_element_bits_on_top() {
        // 4 bits left in the first byte (0xA), then 4 low bits of the second (0x3)
        let mut reader = BitReader::from_le_bytes(&[0xA5, 0xF3], StorageWidth::W8);
        reader.skip_bits(4).unwrap();
        assert_eq!(reader.take_raw(8).unwrap(), 0xA3);
        assert_eq!(reader.take_raw(4).unwrap(), 0xF);
    }

    #[test]
    fn test_field_wider_than_element() {
        let bytes = [0x01, 0x02, 0x03];
        let mut reader = BitReader::from_le_bytes(&bytes, StorageWidth::W8);
        // 0x01, then 0x02, then the low nibble of 0x03
        assert_eq!(reader.take_raw(20).unwrap(), 0x1023);
        assert_eq!(reader.remaining(), 4);
    }

    #[test]
    fn test_fourteen_bit_fields_from_u64() {
        let raw = 0x0000_0000_0000_3FFFu64;
        let mut reader = BitReader::new(vec![raw], StorageWidth::W64);
        assert_eq!(reader.peek_raw(14).unwrap(), 0x3FFF);
        assert_eq!(reader.take_bits(14, Scale::Signed).unwrap(), 0.0);
        assert_eq!(reader.take_raw(14).unwrap(), 0);
    }

    #[test]
    fn test_storage_width_groups_little_endian_bytes() {
        let widths: Vec<(u32, usize)> = StorageWidth::ALL
            .iter()
            .map(|w| (w.bits(), w.bytes()))
            .collect();
        assert_eq!(widths, vec![(8, 1), (16, 2), (32, 4), (64, 8)]);

        let mut reader = BitReader::from_le_bytes(&[0x34, 0x12, 0x78, 0x56], StorageWidth::W16);
        assert_eq!(reader.take_raw(16).unwrap(), 0x1234);
        assert_eq!(reader.take_raw(16).unwrap(), 0x5678);

        let mut writer = BitWriter::new(1, StorageWidth::W32);
        writer.put_raw(0x0102_0304, 32).unwrap();
        assert_eq!(writer.to_le_bytes(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_scale_modes() {
        assert_eq!(Scale::Raw.normalize(200, 8), 200.0);
        assert_eq!(Scale::Unsigned.normalize(255, 8), 1.0);
        assert_eq!(Scale::Unsigned.normalize(0, 8), 0.0);
        assert_eq!(Scale::Signed.normalize(127, 8), 1.0);
        assert_eq!(Scale::Signed.normalize(128, 8), -1.0);
        assert_eq!(Scale::Signed.normalize(255, 8), 0.0);
        assert_eq!(Scale::Signed.normalize(0x1FFF, 14), 1.0);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut reader = BitReader::new(vec![0xFF], StorageWidth::W8);
        reader.skip_bits(6).unwrap();
        assert!(matches!(
            reader.take_raw(3),
            Err(LmtError::TruncatedBuffer {
                needed: 3,
                available: 2,
                ..
            })
        ));
        assert!(reader.skip_bits(3).is_err());
    }

    #[test]
    fn test_rejects_bad_field_width() {
        let reader = BitReader::new(vec![0, 0], StorageWidth::W64);
        assert!(matches!(
            reader.peek_raw(0),
            Err(LmtError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            reader.peek_raw(65),
            Err(LmtError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_writer_rejects_overflow() {
        let mut writer = BitWriter::new(1, StorageWidth::W8);
        assert!(matches!(
            writer.put_raw(16, 4),
            Err(LmtError::ValueOutOfRange { value: 16, max: 15, .. })
        ));
        writer.put_raw(0x7F, 7).unwrap();
        assert!(matches!(
            writer.put_raw(1, 2),
            Err(LmtError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn test_writer_layout_matches_reader() {
        let mut writer = BitWriter::new(2, StorageWidth::W8);
        writer.put_raw(0x5, 4).unwrap();
        writer.put_raw(0xA3, 8).unwrap();
        writer.put_raw(0xF, 4).unwrap();
        assert_eq!(writer.to_le_bytes(), vec![0xA5, 0xF3]);
    }

    proptest! {
        #[test]
        fn prop_skip_then_take_matches_direct_read(
            elements in proptest::collection::vec(any::<u64>(), 1..4),
            storage in proptest::sample::select(StorageWidth::ALL.to_vec()),
            skip in 0u64..256,
            bits in 1u32..=32,
        ) {
            let width = storage.bits();
            let elements: Vec<u64> = elements.iter().map(|e| e & low_mask(width)).collect();
            let total = elements.len() as u64 * width as u64;
            let skip = skip % total;
            let bits = bits.min((total - skip) as u32);

            let mut skipped = BitReader::new(elements.clone(), storage);
            skipped.skip_bits(skip).unwrap();
            let after_skip = skipped.take_raw(bits).unwrap();

            let mut stepped = BitReader::new(elements, storage);
            let mut left = skip;
            while left > 0 {
                let step = left.min(7);
                stepped.take_raw(step as u32).unwrap();
                left -= step;
            }
            prop_assert_eq!(stepped.position(), skip);
            prop_assert_eq!(stepped.take_raw(bits).unwrap(), after_skip);
        }

        #[test]
        fn prop_writer_reader_inverse(
            fields in proptest::collection::vec((1u32..=20, any::<u64>()), 1..6),
            storage in proptest::sample::select(StorageWidth::ALL.to_vec()),
        ) {
            let width = storage.bits();
            let total_bits: u64 = fields.iter().map(|(b, _)| *b as u64).sum();
            let count = total_bits.div_ceil(width as u64) as usize;

            let mut writer = BitWriter::new(count, storage);
            for (bits, value) in &fields {
                writer.put_raw(value & low_mask(*bits), *bits).unwrap();
            }

            let mut reader = BitReader::from_le_bytes(&writer.to_le_bytes(), storage);
            for (bits, value) in &fields {
                prop_assert_eq!(reader.take_raw(*bits).unwrap(), value & low_mask(*bits));
            }
        }

        #[test]
        fn prop_scaled_roundtrip_within_one_step(
            value in -1.0f64..=1.0,
            bits in 2u32..=16,
        ) {
            let max = low_mask(bits) as f64;
            let signed = Scale::Signed.normalize(Scale::Signed.quantize(value, bits), bits);
            prop_assert!((signed - value).abs() <= 1.0 / (max / 2.0).floor());

            let unit = value.abs();
            let unsigned = Scale::Unsigned.normalize(Scale::Unsigned.quantize(unit, bits), bits);
            prop_assert!((unsigned - unit).abs() <= 1.0 / max);
        }
    }
}
