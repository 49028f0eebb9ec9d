//! The LMT container: header, offset table and one shared data image
//!
//! ```text
//! 0x00  magic "LMT\0"
//! 0x04  u16 version
//! 0x06  u16 entry count
//! 0x08  8 reserved bytes
//! 0x10  entry count × u64 absolute block offsets (0 = empty slot)
//!       block data
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::block::AnimationBlock;
use crate::common::{align, check_range, pad_to};
use crate::error::{LmtError, Result};
use crate::events::RecordFormat;
use crate::layout::{BLOCK_ALIGNMENT, LayoutPolicy};
use crate::version::LmtVersion;

/// Container magic
pub const LMT_MAGIC: [u8; 4] = *b"LMT\0";

/// Size of the fixed container header, before the offset table
pub const LMT_HEADER_SIZE: u64 = 16;

/// An LMT file held entirely in memory
///
/// `data` is the complete file image. The header and offset table at its start are
/// rewritten whenever an offset changes, so the image is always a valid file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmtFile {
    version: LmtVersion,
    reserved: [u8; 8],
    offsets: Vec<u64>,
    data: Vec<u8>,
}

impl LmtFile {
    /// Empty container with `entry_count` unpopulated slots
    pub fn new(version: LmtVersion, entry_count: u16) -> Self {
        let mut file = Self {
            version,
            reserved: [0; 8],
            offsets: vec![0; usize::from(entry_count)],
            data: Vec::new(),
        };
        file.sync_header();
        file
    }

    /// Open and parse a container from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(&mut BufReader::new(file))
    }

    /// Read a whole container from `reader`
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(data)
    }

    /// Parse a container from its complete file image
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        if (data.len() as u64) < LMT_HEADER_SIZE {
            return Err(LmtError::MalformedHeader {
                offset: 0,
                reason: format!("{} bytes is too short for a container header", data.len()),
            });
        }

        let mut reader = Cursor::new(data.as_slice());
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != LMT_MAGIC {
            return Err(LmtError::MalformedHeader {
                offset: 0,
                reason: format!("bad magic {magic:02x?}"),
            });
        }

        let raw_version = reader.read_u16::<LittleEndian>()?;
        let version = LmtVersion::from_u16(raw_version).ok_or_else(|| LmtError::MalformedHeader {
            offset: 4,
            reason: format!("unsupported version {raw_version}"),
        })?;
        let entry_count = reader.read_u16::<LittleEndian>()?;
        let mut reserved = [0u8; 8];
        reader.read_exact(&mut reserved)?;

        check_range(
            &data,
            LMT_HEADER_SIZE,
            u64::from(entry_count) * 8,
            "offset table",
        )?;
        let mut offsets = vec![0u64; usize::from(entry_count)];
        reader.read_u64_into::<LittleEndian>(&mut offsets)?;

        log::debug!(
            "Parsed LMT v{version}: {entry_count} entries, {} populated, {} bytes",
            offsets.iter().filter(|&&o| o != 0).count(),
            data.len()
        );

        Ok(Self {
            version,
            reserved,
            offsets,
            data,
        })
    }

    pub fn version(&self) -> LmtVersion {
        self.version
    }

    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// Absolute block offsets, 0 for empty slots
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// The complete file image
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset_of(&self, id: usize) -> Result<u64> {
        self.offsets
            .get(id)
            .copied()
            .ok_or(LmtError::EntryOutOfRange {
                id,
                count: self.offsets.len(),
            })
    }

    pub fn has_animation(&self, id: usize) -> bool {
        self.offsets.get(id).is_some_and(|&offset| offset != 0)
    }

    /// Slot indices that hold a block
    pub fn populated_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .filter(|(_, offset)| **offset != 0)
            .map(|(id, _)| id)
    }

    /// Decode the block in slot `id`, or `None` for an empty slot
    pub fn get(&self, id: usize) -> Result<Option<AnimationBlock>> {
        self.get_with_format(id, RecordFormat::default())
    }

    /// Like [`get`](Self::get), decoding event data records as `records`
    pub fn get_with_format(
        &self,
        id: usize,
        records: RecordFormat,
    ) -> Result<Option<AnimationBlock>> {
        match self.offset_of(id)? {
            0 => Ok(None),
            offset => AnimationBlock::parse(&self.data, offset, records).map(Some),
        }
    }

    /// Append `block` to the image and point slot `id` at it
    ///
    /// The image is zero-padded to a 16-byte boundary first. Bytes of the block the
    /// slot used to reference are left in place; other slots are untouched.
    /// Returns the new block offset.
    pub fn override_animation(
        &mut self,
        id: usize,
        block: &AnimationBlock,
        policy: LayoutPolicy,
    ) -> Result<u64> {
        self.offset_of(id)?;

        let offset = align(self.data.len() as u64, BLOCK_ALIGNMENT);
        let bytes = block.serialize(offset, policy)?;
        pad_to(&mut self.data, offset);
        self.data.extend_from_slice(&bytes);
        self.offsets[id] = offset;
        self.sync_header();

        log::debug!(
            "Slot {id} now points at {offset:#x} ({} bytes, {policy})",
            bytes.len()
        );
        Ok(offset)
    }

    /// Mark slot `id` empty without touching the block data
    pub fn clear(&mut self, id: usize) -> Result<()> {
        self.offset_of(id)?;
        self.offsets[id] = 0;
        self.sync_header();
        Ok(())
    }

    /// Rewrite the header and offset table at the start of the image
    fn sync_header(&mut self) {
        let table_end = LMT_HEADER_SIZE + self.offsets.len() as u64 * 8;
        pad_to(&mut self.data, table_end);

        let mut header = Vec::with_capacity(table_end as usize);
        header.extend_from_slice(&LMT_MAGIC);
        header.extend_from_slice(&self.version.to_u16().to_le_bytes());
        header.extend_from_slice(&(self.offsets.len() as u16).to_le_bytes());
        header.extend_from_slice(&self.reserved);
        for offset in &self.offsets {
            header.extend_from_slice(&offset.to_le_bytes());
        }
        self.data[..header.len()].copy_from_slice(&header);
    }

    /// Write the file image to `writer`
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// Write the file image to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_container_layout() {
        let file = LmtFile::new(LmtVersion::V95, 3);
        let bytes = file.to_bytes();
        assert_eq!(bytes.len(), 16 + 24);
        assert_eq!(&bytes[0..4], b"LMT\0");
        assert_eq!(&bytes[4..6], &95u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &3u16.to_le_bytes());
        assert_eq!(file.entry_count(), 3);
        assert_eq!(file.populated_ids().count(), 0);
        assert!(file.get(2).unwrap().is_none());
    }

    #[test]
    fn test_header_errors() {
        assert!(matches!(
            LmtFile::parse(b"LMT\0".to_vec()),
            Err(LmtError::MalformedHeader { offset: 0, .. })
        ));

        let mut bytes = LmtFile::new(LmtVersion::V95, 1).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            LmtFile::parse(bytes),
            Err(LmtError::MalformedHeader { offset: 0, .. })
        ));

        let mut bytes = LmtFile::new(LmtVersion::V95, 1).to_bytes();
        bytes[4..6].copy_from_slice(&51u16.to_le_bytes());
        assert!(matches!(
            LmtFile::parse(bytes),
            Err(LmtError::MalformedHeader { offset: 4, .. })
        ));

        let mut bytes = LmtFile::new(LmtVersion::V95, 4).to_bytes();
        bytes.truncate(30);
        assert!(matches!(
            LmtFile::parse(bytes),
            Err(LmtError::OffsetOutOfRange {
                field: "offset table",
                ..
            })
        ));
    }

    #[test]
    fn test_override_aligns_and_appends() {
        let mut file = LmtFile::new(LmtVersion::V95, 3);
        let block = AnimationBlock {
            frame_count: 12,
            ..AnimationBlock::default()
        };

        let first = file.override_animation(1, &block, LayoutPolicy::BOUNDS_FIRST).unwrap();
        assert_eq!(first, 48);
        let second = file.override_animation(1, &block, LayoutPolicy::BOUNDS_FIRST).unwrap();
        assert_eq!(second, 48 + 96);
        assert_eq!(file.offsets(), &[0, second, 0]);
        assert_eq!(file.data().len() as u64, second + 96);

        let reparsed = LmtFile::parse(file.to_bytes()).unwrap();
        assert_eq!(reparsed, file);
        assert_eq!(reparsed.get(1).unwrap(), Some(block));
    }

    #[test]
    fn test_slot_bounds() {
        let mut file = LmtFile::new(LmtVersion::V95, 2);
        assert!(matches!(
            file.get(2),
            Err(LmtError::EntryOutOfRange { id: 2, count: 2 })
        ));
        assert!(matches!(
            file.override_animation(5, &AnimationBlock::default(), LayoutPolicy::BUFFERS_FIRST),
            Err(LmtError::EntryOutOfRange { id: 5, .. })
        ));
        assert!(!file.has_animation(9));
        assert_eq!(file.entry_count(), 2);
    }

    #[test]
    fn test_clear_slot() {
        let mut file = LmtFile::new(LmtVersion::V95, 1);
        file.override_animation(0, &AnimationBlock::default(), LayoutPolicy::BOUNDS_FIRST)
            .unwrap();
        assert!(file.has_animation(0));
        file.clear(0).unwrap();
        assert!(!file.has_animation(0));
        assert_eq!(LmtFile::parse(file.to_bytes()).unwrap().offsets(), &[0]);
    }
}
