//! Animation blocks and their byte layout
//!
//! A block is a 96-byte header followed by its channel table and the data the
//! channels point at. All offsets are absolute within the enclosing file, so the
//! same block serializes differently depending on where it is placed.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Seek, SeekFrom, Write};

use crate::bounds::BOUNDS_SIZE;
use crate::channel::{BoneChannel, CHANNEL_RECORD_SIZE};
use crate::common::{DecodeBudget, align, check_range, cursor_at, table_size};
use crate::error::{LmtError, Result};
use crate::events::{Events, EventsLayout, RecordFormat};
use crate::layout::{BOUNDS_ALIGNMENT, BoundsPlacement, EVENTS_ALIGNMENT, LayoutPolicy};
use crate::sink::KeyframeSink;

/// Size of the block header
pub const BLOCK_HEADER_SIZE: u64 = 96;

/// Number of reserved `i32` words in the block header
pub const BLOCK_RESERVED_WORDS: usize = 17;

/// One animation: its channels and optional events tree
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationBlock {
    pub frame_count: i32,
    pub loop_frame: i32,
    pub reserved: [i32; BLOCK_RESERVED_WORDS],
    pub channels: Vec<BoneChannel>,
    pub events: Option<Events>,
}

/// Where one channel's buffer and bounds land; 0 marks absent data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelPlacement {
    pub buffer_offset: u64,
    pub bounds_offset: u64,
}

/// Absolute offsets of everything in a serialized block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub base: u64,
    pub channels_offset: u64,
    pub channels: Vec<ChannelPlacement>,
    pub events: Option<EventsLayout>,
    /// First byte past the block
    pub end: u64,
}

impl BlockLayout {
    pub fn events_offset(&self) -> u64 {
        self.events.as_ref().map_or(0, |events| events.header_offset)
    }

    /// Serialized size in bytes
    pub fn len(&self) -> u64 {
        self.end - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.base
    }
}

impl Default for AnimationBlock {
    fn default() -> Self {
        Self {
            frame_count: 0,
            loop_frame: -1,
            reserved: [0; BLOCK_RESERVED_WORDS],
            channels: Vec::new(),
            events: None,
        }
    }
}

impl AnimationBlock {
    /// Decode the block whose header starts at the absolute `offset` in `data`
    pub fn parse(data: &[u8], offset: u64, records: RecordFormat) -> Result<Self> {
        let mut budget = DecodeBudget::for_input(data);
        let mut reader = cursor_at(data, offset, BLOCK_HEADER_SIZE, "animation block header")?;
        budget.charge(BLOCK_HEADER_SIZE, "animation block header", offset)?;

        let channels_offset = reader.read_u64::<LittleEndian>()?;
        let channel_count = reader.read_i32::<LittleEndian>()?;
        let frame_count = reader.read_i32::<LittleEndian>()?;
        let loop_frame = reader.read_i32::<LittleEndian>()?;
        let mut reserved = [0i32; BLOCK_RESERVED_WORDS];
        reader.read_i32_into::<LittleEndian>(&mut reserved)?;
        let events_offset = reader.read_u64::<LittleEndian>()?;

        let channel_count =
            u64::try_from(channel_count).map_err(|_| LmtError::MalformedHeader {
                offset: offset + 8,
                reason: format!("negative channel count {channel_count}"),
            })?;
        let table = table_size(channel_count, CHANNEL_RECORD_SIZE, "bone channel", offset + 8)?;
        if channel_count > 0 {
            check_range(data, channels_offset, table, "bone channel table")?;
        }

        let channels = (0..channel_count)
            .map(|i| {
                let record = channels_offset + i * CHANNEL_RECORD_SIZE;
                BoneChannel::parse_with_budget(data, record, &mut budget)
            })
            .collect::<Result<Vec<_>>>()?;

        let events = if events_offset == 0 {
            None
        } else {
            Some(Events::parse_with_budget(
                data,
                events_offset,
                records,
                &mut budget,
            )?)
        };

        log::debug!(
            "Parsed animation block at {offset:#x}: {} channels, {frame_count} frames, events {}",
            channels.len(),
            if events.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            frame_count,
            loop_frame,
            reserved,
            channels,
            events,
        })
    }

    /// Compute every offset for a block whose header is written at `base`
    pub fn layout(&self, base: u64, policy: LayoutPolicy) -> BlockLayout {
        let channels_offset = base + BLOCK_HEADER_SIZE;
        let mut cursor = channels_offset + self.channels.len() as u64 * CHANNEL_RECORD_SIZE;
        let mut placements = vec![ChannelPlacement::default(); self.channels.len()];

        match policy.bounds_placement {
            BoundsPlacement::BeforeBuffers => {
                cursor = self.place_bounds(cursor, &mut placements);
                cursor = self.place_buffers(cursor, policy.buffer_alignment, &mut placements);
            }
            BoundsPlacement::AfterBuffers => {
                cursor = self.place_buffers(cursor, policy.buffer_alignment, &mut placements);
                cursor = self.place_bounds(cursor, &mut placements);
            }
        }

        let events = self
            .events
            .as_ref()
            .map(|events| events.layout(align(cursor, EVENTS_ALIGNMENT)));
        let end = events.as_ref().map_or(cursor, |events| events.end);

        log::trace!(
            "Laid out block at {base:#x} ({policy}): {} channels, ends at {end:#x}",
            self.channels.len()
        );

        BlockLayout {
            base,
            channels_offset,
            channels: placements,
            events,
            end,
        }
    }

    fn place_bounds(&self, cursor: u64, placements: &mut [ChannelPlacement]) -> u64 {
        if self.channels.iter().all(|c| c.bounds.is_none()) {
            return cursor;
        }
        let mut cursor = align(cursor, BOUNDS_ALIGNMENT);
        for (channel, placement) in self.channels.iter().zip(placements) {
            if channel.bounds.is_some() {
                placement.bounds_offset = cursor;
                cursor += BOUNDS_SIZE;
            }
        }
        cursor
    }

    fn place_buffers(
        &self,
        cursor: u64,
        alignment: u64,
        placements: &mut [ChannelPlacement],
    ) -> u64 {
        let mut cursor = cursor;
        for (channel, placement) in self.channels.iter().zip(placements) {
            if channel.buffer.is_empty() {
                continue;
            }
            cursor = align(cursor, alignment);
            placement.buffer_offset = cursor;
            cursor = align(cursor + channel.buffer.len() as u64, alignment);
        }
        cursor
    }

    /// Serialize with the header at the absolute offset `base`
    ///
    /// The returned bytes are meant to be placed at `base`; every offset they
    /// contain already accounts for it.
    pub fn serialize(&self, base: u64, policy: LayoutPolicy) -> Result<Vec<u8>> {
        let layout = self.layout(base, policy);
        let channel_count =
            i32::try_from(self.channels.len()).map_err(|_| LmtError::ValueOutOfRange {
                field: "channel count",
                value: self.channels.len() as u64,
                max: i32::MAX as u64,
            })?;

        let mut writer = Cursor::new(vec![0u8; layout.len() as usize]);
        writer.write_u64::<LittleEndian>(layout.channels_offset)?;
        writer.write_i32::<LittleEndian>(channel_count)?;
        writer.write_i32::<LittleEndian>(self.frame_count)?;
        writer.write_i32::<LittleEndian>(self.loop_frame)?;
        for &value in &self.reserved {
            writer.write_i32::<LittleEndian>(value)?;
        }
        writer.write_u64::<LittleEndian>(layout.events_offset())?;

        for (channel, placement) in self.channels.iter().zip(&layout.channels) {
            channel.write_record(
                &mut writer,
                placement.buffer_offset,
                placement.bounds_offset,
            )?;
        }

        for (channel, placement) in self.channels.iter().zip(&layout.channels) {
            if let Some(bounds) = &channel.bounds {
                writer.seek(SeekFrom::Start(placement.bounds_offset - base))?;
                bounds.write(&mut writer)?;
            }
            if !channel.buffer.is_empty() {
                writer.seek(SeekFrom::Start(placement.buffer_offset - base))?;
                writer.write_all(&channel.buffer)?;
            }
        }

        let mut out = writer.into_inner();
        if let (Some(events), Some(events_layout)) = (&self.events, &layout.events) {
            let start = (events_layout.header_offset - base) as usize;
            let mut tree = Vec::new();
            events.write_into(&mut tree, events_layout.header_offset, events_layout)?;
            out[start..start + tree.len()].copy_from_slice(&tree);
        }

        Ok(out)
    }

    /// Decode a standalone block file whose header sits at byte 0
    pub fn from_lmta_bytes(data: &[u8], records: RecordFormat) -> Result<Self> {
        Self::parse(data, 0, records)
    }

    /// Serialize as a standalone block file
    pub fn to_lmta_bytes(&self, policy: LayoutPolicy) -> Result<Vec<u8>> {
        self.serialize(0, policy)
    }

    /// Channels driving the given bone
    pub fn channels_for_bone(&self, bone_id: i32) -> impl Iterator<Item = &BoneChannel> {
        self.channels.iter().filter(move |c| c.bone_id == bone_id)
    }

    /// Decode every channel and hand its key stream to `sink`, in channel order
    pub fn play_into<S: KeyframeSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        for channel in &self.channels {
            let keys = channel.keyframes()?;
            sink.channel(channel.bone_id, channel.usage, &keys)?;
        }
        Ok(())
    }
}
