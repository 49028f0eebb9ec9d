//! Events tree: events → parameters → fixed-size data records
//!
//! On disk the tree is a header followed by three levels of tables. Every table
//! starts on a 16-byte boundary, and each parent's group of child tables is padded
//! to 16 bytes before the next one starts:
//!
//! ```text
//! header (48)         offset, count, 8 × i32 reserved
//! event table         count × (offset, count, type tag)       pad 16
//! parameter tables    one per event, each                     pad 16
//! record tables       one per parameter, each                 pad 16
//! ```
//!
//! Offsets and counts are recomputed from the in-memory tree on every write.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::common::{DecodeBudget, align, cursor_at, pad_to, table_size};
use crate::error::Result;
use crate::layout::EVENTS_ALIGNMENT;

/// Size of the events header
pub const EVENTS_HEADER_SIZE: u64 = 48;
/// Size of an event or parameter table entry
pub const ENTRY_RECORD_SIZE: u64 = 24;
/// Size of one data record
pub const DATA_RECORD_SIZE: u64 = 20;

/// Representation used for data records when decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordFormat {
    /// 20 uninterpreted bytes
    Opaque,
    /// Five little-endian `i32`s
    #[default]
    Packed,
}

/// One leaf record of the events tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataRecord {
    Opaque([u8; 20]),
    Packed([i32; 5]),
}

impl DataRecord {
    pub fn parse<R: Read>(reader: &mut R, format: RecordFormat) -> Result<Self> {
        match format {
            RecordFormat::Opaque => {
                let mut bytes = [0u8; 20];
                reader.read_exact(&mut bytes)?;
                Ok(Self::Opaque(bytes))
            }
            RecordFormat::Packed => {
                let mut values = [0i32; 5];
                reader.read_i32_into::<LittleEndian>(&mut values)?;
                Ok(Self::Packed(values))
            }
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::Opaque(bytes) => writer.write_all(bytes)?,
            Self::Packed(values) => {
                for &value in values {
                    writer.write_i32::<LittleEndian>(value)?;
                }
            }
        }
        Ok(())
    }

    /// The record's 20 bytes as stored
    pub fn to_bytes(&self) -> [u8; 20] {
        match self {
            Self::Opaque(bytes) => *bytes,
            Self::Packed(values) => {
                let mut bytes = [0u8; 20];
                for (chunk, value) in bytes.chunks_exact_mut(4).zip(values) {
                    chunk.copy_from_slice(&value.to_le_bytes());
                }
                bytes
            }
        }
    }
}

/// A parameter of an event, owning its data records
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameter {
    pub type_tag: [u8; 8],
    pub records: Vec<DataRecord>,
}

/// An event, owning its parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    pub type_tag: [u8; 8],
    pub parameters: Vec<Parameter>,
}

/// Root of the events tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Events {
    pub reserved: [i32; 8],
    pub events: Vec<Event>,
}

/// Absolute offsets of every table in a laid-out events tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsLayout {
    pub header_offset: u64,
    pub event_table_offset: u64,
    /// One per event
    pub parameter_table_offsets: Vec<u64>,
    /// One per parameter, grouped by event
    pub record_table_offsets: Vec<Vec<u64>>,
    /// First byte past the padded tree
    pub end: u64,
}

/// A table entry as stored: where the children are, how many, and the entry's tag
struct EntryRecord {
    offset: u64,
    count: u64,
    type_tag: [u8; 8],
}

impl EntryRecord {
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let offset = reader.read_u64::<LittleEndian>()?;
        let count = reader.read_u64::<LittleEndian>()?;
        let mut type_tag = [0u8; 8];
        reader.read_exact(&mut type_tag)?;
        Ok(Self {
            offset,
            count,
            type_tag,
        })
    }

    fn write<W: Write>(
        writer: &mut W,
        offset: u64,
        count: usize,
        type_tag: &[u8; 8],
    ) -> Result<()> {
        writer.write_u64::<LittleEndian>(offset)?;
        writer.write_u64::<LittleEndian>(count as u64)?;
        writer.write_all(type_tag)?;
        Ok(())
    }
}

/// Read a table of `count` entries at `offset`, checking the whole table fits first
fn parse_entry_table(
    data: &[u8],
    offset: u64,
    count: u64,
    field: &'static str,
    budget: &mut DecodeBudget,
) -> Result<Vec<EntryRecord>> {
    let size = table_size(count, ENTRY_RECORD_SIZE, field, offset)?;
    let mut reader = cursor_at(data, offset, size, field)?;
    budget.charge(size, field, offset)?;
    (0..count).map(|_| EntryRecord::parse(&mut reader)).collect()
}

impl Events {
    /// Decode the tree whose header starts at the absolute `offset`
    ///
    /// Tables may be shared between entries, but a tree that decodes to more than
    /// [`DECODE_AMPLIFICATION_LIMIT`](crate::common::DECODE_AMPLIFICATION_LIMIT) times
    /// the size of `data` is rejected with
    /// [`LmtError::MalformedHeader`](crate::LmtError::MalformedHeader).
    pub fn parse(data: &[u8], offset: u64, format: RecordFormat) -> Result<Self> {
        Self::parse_with_budget(data, offset, format, &mut DecodeBudget::for_input(data))
    }

    pub(crate) fn parse_with_budget(
        data: &[u8],
        offset: u64,
        format: RecordFormat,
        budget: &mut DecodeBudget,
    ) -> Result<Self> {
        let mut reader = cursor_at(data, offset, EVENTS_HEADER_SIZE, "events header")?;
        budget.charge(EVENTS_HEADER_SIZE, "events header", offset)?;
        let table_offset = reader.read_u64::<LittleEndian>()?;
        let event_count = reader.read_u64::<LittleEndian>()?;
        let mut reserved = [0i32; 8];
        reader.read_i32_into::<LittleEndian>(&mut reserved)?;

        let mut events = Vec::new();
        for entry in parse_entry_table(data, table_offset, event_count, "event table", budget)? {
            let mut parameters = Vec::new();
            let field = "parameter table";
            for param in parse_entry_table(data, entry.offset, entry.count, field, budget)? {
                let field = "data record table";
                let size = table_size(param.count, DATA_RECORD_SIZE, field, param.offset)?;
                let mut reader = cursor_at(data, param.offset, size, field)?;
                budget.charge(size, field, param.offset)?;
                let records = (0..param.count)
                    .map(|_| DataRecord::parse(&mut reader, format))
                    .collect::<Result<Vec<_>>>()?;
                parameters.push(Parameter {
                    type_tag: param.type_tag,
                    records,
                });
            }
            events.push(Event {
                type_tag: entry.type_tag,
                parameters,
            });
        }

        let tree = Self { reserved, events };
        log::debug!(
            "Parsed events tree at {offset:#x}: {} events, {} parameters, {} records",
            tree.events.len(),
            tree.parameter_count(),
            tree.record_count()
        );
        Ok(tree)
    }

    /// Compute table offsets for a tree whose header is written at `offset`
    pub fn layout(&self, offset: u64) -> EventsLayout {
        let event_table_offset = offset + EVENTS_HEADER_SIZE;
        let mut cursor = align(
            event_table_offset + self.events.len() as u64 * ENTRY_RECORD_SIZE,
            EVENTS_ALIGNMENT,
        );

        let mut parameter_table_offsets = Vec::with_capacity(self.events.len());
        for event in &self.events {
            parameter_table_offsets.push(cursor);
            cursor = align(
                cursor + event.parameters.len() as u64 * ENTRY_RECORD_SIZE,
                EVENTS_ALIGNMENT,
            );
        }

        let mut record_table_offsets = Vec::with_capacity(self.events.len());
        for event in &self.events {
            let mut tables = Vec::with_capacity(event.parameters.len());
            for param in &event.parameters {
                tables.push(cursor);
                cursor = align(
                    cursor + param.records.len() as u64 * DATA_RECORD_SIZE,
                    EVENTS_ALIGNMENT,
                );
            }
            record_table_offsets.push(tables);
        }

        EventsLayout {
            header_offset: offset,
            event_table_offset,
            parameter_table_offsets,
            record_table_offsets,
            end: cursor,
        }
    }

    /// Write the tree at `layout.header_offset`
    ///
    /// `out[0]` sits at the absolute offset `base`; `out` must not extend past the
    /// header offset yet.
    pub fn write_into(&self, out: &mut Vec<u8>, base: u64, layout: &EventsLayout) -> Result<()> {
        pad_to(out, layout.header_offset - base);
        out.write_u64::<LittleEndian>(layout.event_table_offset)?;
        out.write_u64::<LittleEndian>(self.events.len() as u64)?;
        for &value in &self.reserved {
            out.write_i32::<LittleEndian>(value)?;
        }

        for (event, &table) in self.events.iter().zip(&layout.parameter_table_offsets) {
            EntryRecord::write(out, table, event.parameters.len(), &event.type_tag)?;
        }

        for ((event, &table), records) in self
            .events
            .iter()
            .zip(&layout.parameter_table_offsets)
            .zip(&layout.record_table_offsets)
        {
            pad_to(out, table - base);
            for (param, &records) in event.parameters.iter().zip(records) {
                EntryRecord::write(out, records, param.records.len(), &param.type_tag)?;
            }
        }

        for (event, tables) in self.events.iter().zip(&layout.record_table_offsets) {
            for (param, &table) in event.parameters.iter().zip(tables) {
                pad_to(out, table - base);
                for record in &param.records {
                    record.write(out)?;
                }
            }
        }

        pad_to(out, layout.end - base);
        Ok(())
    }

    /// Serialize as a standalone tree starting at `offset`
    pub fn to_bytes(&self, offset: u64) -> Result<Vec<u8>> {
        let layout = self.layout(offset);
        let mut out = Vec::new();
        self.write_into(&mut out, offset, &layout)?;
        Ok(out)
    }

    /// Total number of parameters across all events
    pub fn parameter_count(&self) -> usize {
        self.events.iter().map(|e| e.parameters.len()).sum()
    }

    /// Total number of data records across the tree
    pub fn record_count(&self) -> usize {
        self.events
            .iter()
            .flat_map(|e| &e.parameters)
            .map(|p| p.records.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LmtError;
    use pretty_assertions::assert_eq;

    fn tag(name: &str) -> [u8; 8] {
        let mut tag = [0u8; 8];
        tag[..name.len()].copy_from_slice(name.as_bytes());
        tag
    }

    fn parameter(name: &str, records: usize) -> Parameter {
        Parameter {
            type_tag: tag(name),
            records: (0..records as i32)
                .map(|i| DataRecord::Packed([i, i + 1, -i, 0, 7]))
                .collect(),
        }
    }

    fn sample_tree() -> Events {
        Events {
            reserved: [0, 1, 2, 3, 4, 5, 6, 7],
            events: vec![
                Event {
                    type_tag: tag("sound"),
                    parameters: vec![parameter("a", 1), parameter("b", 3)],
                },
                Event {
                    type_tag: tag("empty"),
                    parameters: Vec::new(),
                },
                Event {
                    type_tag: tag("effect"),
                    parameters: vec![parameter("c", 0), parameter("d", 2)],
                },
            ],
        }
    }

    fn roundtrip(tree: &Events, offset: u64) -> Events {
        let mut data = vec![0u8; offset as usize];
        data.extend(tree.to_bytes(offset).unwrap());
        Events::parse(&data, offset, RecordFormat::Packed).unwrap()
    }

    #[test]
    fn test_empty_tree() {
        let tree = Events::default();
        let layout = tree.layout(0x40);
        assert_eq!(layout.event_table_offset, 0x70);
        assert_eq!(layout.end, 0x70);

        let bytes = tree.to_bytes(0x40).unwrap();
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[0..8], &0x70u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &0u64.to_le_bytes());
        assert_eq!(roundtrip(&tree, 0x40), tree);
    }

    #[test]
    fn test_single_event_tree() {
        let tree = Events {
            reserved: [0; 8],
            events: vec![Event {
                type_tag: tag("one"),
                parameters: vec![parameter("p", 1)],
            }],
        };
        let layout = tree.layout(0);
        assert_eq!(layout.event_table_offset, 48);
        assert_eq!(layout.parameter_table_offsets, vec![80]);
        assert_eq!(layout.record_table_offsets, vec![vec![112]]);
        assert_eq!(layout.end, 144);
        assert_eq!(roundtrip(&tree, 0), tree);
    }

    #[test]
    fn test_nested_tree_alignment() {
        let tree = sample_tree();
        let layout = tree.layout(0x130);

        let mut offsets = vec![layout.header_offset, layout.event_table_offset, layout.end];
        offsets.extend(&layout.parameter_table_offsets);
        offsets.extend(layout.record_table_offsets.iter().flatten());
        for offset in offsets {
            assert_eq!(offset % 16, 0, "offset {offset:#x} is not 16-byte aligned");
        }

        // The empty event still gets a (zero-length) table of its own
        assert_eq!(
            layout.parameter_table_offsets[1],
            layout.parameter_table_offsets[2]
        );

        let bytes = tree.to_bytes(0x130).unwrap();
        assert_eq!(bytes.len() as u64, layout.end - 0x130);
        assert_eq!(roundtrip(&tree, 0x130), tree);
        assert_eq!(tree.parameter_count(), 4);
        assert_eq!(tree.record_count(), 6);
    }

    #[test]
    fn test_derived_fields_are_rewritten() {
        let mut tree = sample_tree();
        let first = roundtrip(&tree, 0);
        tree.events[0].parameters[1].records.pop();
        tree.events.push(Event::default());
        let second = roundtrip(&tree, 0);
        assert_ne!(first, second);
        assert_eq!(second, tree);
    }

    #[test]
    fn test_opaque_records() {
        let tree = sample_tree();
        let data = tree.to_bytes(0).unwrap();
        let opaque = Events::parse(&data, 0, RecordFormat::Opaque).unwrap();

        let original = &tree.events[0].parameters[1].records[2];
        let parsed = &opaque.events[0].parameters[1].records[2];
        assert!(matches!(parsed, DataRecord::Opaque(_)));
        assert_eq!(parsed.to_bytes(), original.to_bytes());
    }

    #[test]
    fn test_truncated_tables() {
        let tree = sample_tree();
        let data = tree.to_bytes(0).unwrap();
        let layout = tree.layout(0);
        let cut = layout.record_table_offsets[2][1] as usize + 10;
        assert!(matches!(
            Events::parse(&data[..cut], 0, RecordFormat::Packed),
            Err(LmtError::OffsetOutOfRange {
                field: "data record table",
                ..
            })
        ));

        let mut data = data;
        data[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            Events::parse(&data, 0, RecordFormat::Packed),
            Err(LmtError::MalformedHeader { .. })
        ));
    }

    /// Events that all share one parameter table whose entries share one record table
    fn shared_tables(events: u64, parameters: u64, records: u64) -> Vec<u8> {
        let parameter_table = EVENTS_HEADER_SIZE + events * ENTRY_RECORD_SIZE;
        let record_table = parameter_table + parameters * ENTRY_RECORD_SIZE;

        let mut data = Vec::new();
        data.write_u64::<LittleEndian>(EVENTS_HEADER_SIZE).unwrap();
        data.write_u64::<LittleEndian>(events).unwrap();
        data.extend_from_slice(&[0; 32]);
        for _ in 0..events {
            EntryRecord::write(&mut data, parameter_table, parameters as usize, &tag("ev"))
                .unwrap();
        }
        for _ in 0..parameters {
            EntryRecord::write(&mut data, record_table, records as usize, &tag("pa")).unwrap();
        }
        data.resize((record_table + records * DATA_RECORD_SIZE) as usize, 0x11);
        data
    }

    #[test]
    fn test_small_shared_tables_decode() {
        let data = shared_tables(2, 1, 1);
        let tree = Events::parse(&data, 0, RecordFormat::Opaque).unwrap();
        assert_eq!(tree.events.len(), 2);
        assert_eq!(tree.events[0], tree.events[1]);
        assert_eq!(tree.record_count(), 2);
    }

    #[test]
    fn test_aliased_tables_are_rejected() {
        let data = shared_tables(20, 20, 20);
        assert_eq!(data.len(), 1408);
        assert!(matches!(
            Events::parse(&data, 0, RecordFormat::Packed),
            Err(LmtError::MalformedHeader { .. })
        ));
    }
}
