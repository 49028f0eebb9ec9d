//! Bone channels: one keyframe curve per bone and usage

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use std::fmt;
use std::io::Write;

use crate::bounds::{BOUNDS_SIZE, Bounds};
use crate::common::{DecodeBudget, cursor_at, slice_at};
use crate::error::{LmtError, Result};
use crate::keyframe::{Keyframe, KeyframeEncoding};

/// Size of one serialized channel record
pub const CHANNEL_RECORD_SIZE: u64 = 48;

/// Bone identifier used for the root / unmapped channel
pub const ROOT_BONE_ID: i32 = -1;

/// What a channel drives, and in which space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelUsage {
    RotationPose,
    TranslationPose,
    RotationLocal,
    TranslationLocal,
    /// Usage codes the engine defines but this codec does not interpret
    Other(u8),
}

impl ChannelUsage {
    pub const fn from_code(code: u8) -> Self {
        match code {
            0 => Self::RotationPose,
            1 => Self::TranslationPose,
            3 => Self::RotationLocal,
            4 => Self::TranslationLocal,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::RotationPose => 0,
            Self::TranslationPose => 1,
            Self::RotationLocal => 3,
            Self::TranslationLocal => 4,
            Self::Other(code) => code,
        }
    }

    /// Whether the channel's reference frame is a quaternion
    pub const fn is_rotation(self) -> bool {
        matches!(self, Self::RotationPose | Self::RotationLocal)
    }
}

impl fmt::Display for ChannelUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RotationPose => write!(f, "rotation (pose)"),
            Self::TranslationPose => write!(f, "translation (pose)"),
            Self::RotationLocal => write!(f, "rotation (local)"),
            Self::TranslationLocal => write!(f, "translation (local)"),
            Self::Other(code) => write!(f, "usage {code}"),
        }
    }
}

/// Animation curve for a single bone
#[derive(Debug, Clone, PartialEq)]
pub struct BoneChannel {
    pub encoding: KeyframeEncoding,
    pub usage: ChannelUsage,
    pub joint_type: u8,
    pub reserved: u8,
    pub bone_id: i32,
    /// Stored and written back, not used when decoding keys
    pub weight: f32,
    /// Encoded keys, `encoding.key_size()` bytes each
    pub buffer: Vec<u8>,
    /// Single pose used when `buffer` is empty, as `[x, y, z, w]`
    pub reference_frame: [f32; 4],
    pub bounds: Option<Bounds>,
}

impl BoneChannel {
    /// Empty channel holding the identity pose
    pub fn new(bone_id: i32, usage: ChannelUsage, encoding: KeyframeEncoding) -> Self {
        Self {
            encoding,
            usage,
            joint_type: 0,
            reserved: 0,
            bone_id,
            weight: 1.0,
            buffer: Vec::new(),
            reference_frame: [0.0, 0.0, 0.0, 1.0],
            bounds: None,
        }
    }

    /// Parse the record at `offset` and resolve its buffer and bounds from `data`
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        Self::parse_with_budget(data, offset, &mut DecodeBudget::for_input(data))
    }

    pub(crate) fn parse_with_budget(
        data: &[u8],
        offset: u64,
        budget: &mut DecodeBudget,
    ) -> Result<Self> {
        let mut reader = cursor_at(data, offset, CHANNEL_RECORD_SIZE, "bone channel record")?;
        budget.charge(CHANNEL_RECORD_SIZE, "bone channel record", offset)?;

        let tag = reader.read_u8()?;
        let encoding =
            KeyframeEncoding::from_tag(tag).ok_or(LmtError::UnknownEncodingTag { tag, offset })?;
        let usage = ChannelUsage::from_code(reader.read_u8()?);
        let joint_type = reader.read_u8()?;
        let reserved = reader.read_u8()?;
        let bone_id = reader.read_i32::<LittleEndian>()?;
        let weight = reader.read_f32::<LittleEndian>()?;
        let buffer_size = reader.read_i32::<LittleEndian>()?;
        let buffer_offset = reader.read_i64::<LittleEndian>()?;
        let mut reference_frame = [0.0; 4];
        for item in &mut reference_frame {
            *item = reader.read_f32::<LittleEndian>()?;
        }
        let bounds_offset = reader.read_i64::<LittleEndian>()?;

        let buffer_size = non_negative(buffer_size.into(), "buffer size", offset + 12)?;
        let buffer_offset = non_negative(buffer_offset, "buffer offset", offset + 16)?;
        let bounds_offset = non_negative(bounds_offset, "bounds offset", offset + 40)?;

        let buffer = if buffer_size != 0 && buffer_offset != 0 {
            let bytes = slice_at(data, buffer_offset, buffer_size, "keyframe buffer")?;
            budget.charge(buffer_size, "keyframe buffer", buffer_offset)?;
            bytes.to_vec()
        } else {
            Vec::new()
        };

        let bounds = if bounds_offset == 0 {
            None
        } else {
            let mut reader = cursor_at(data, bounds_offset, BOUNDS_SIZE, "bounds")?;
            budget.charge(BOUNDS_SIZE, "bounds", bounds_offset)?;
            Some(Bounds::parse(&mut reader)?)
        };

        log::trace!(
            "Channel at {offset:#x}: bone {bone_id}, {usage}, tag {tag}, \
             {buffer_size} bytes at {buffer_offset:#x}, bounds at {bounds_offset:#x}"
        );

        Ok(Self {
            encoding,
            usage,
            joint_type,
            reserved,
            bone_id,
            weight,
            buffer,
            reference_frame,
            bounds,
        })
    }

    /// Write the 48-byte record with the given absolute offsets (0 for absent data)
    pub fn write_record<W: Write>(
        &self,
        writer: &mut W,
        buffer_offset: u64,
        bounds_offset: u64,
    ) -> Result<()> {
        let buffer_size =
            i32::try_from(self.buffer.len()).map_err(|_| LmtError::ValueOutOfRange {
                field: "buffer size",
                value: self.buffer.len() as u64,
                max: i32::MAX as u64,
            })?;

        writer.write_u8(self.encoding.tag())?;
        writer.write_u8(self.usage.code())?;
        writer.write_u8(self.joint_type)?;
        writer.write_u8(self.reserved)?;
        writer.write_i32::<LittleEndian>(self.bone_id)?;
        writer.write_f32::<LittleEndian>(self.weight)?;
        writer.write_i32::<LittleEndian>(buffer_size)?;
        writer.write_i64::<LittleEndian>(signed_offset(buffer_offset)?)?;
        for &value in &self.reference_frame {
            writer.write_f32::<LittleEndian>(value)?;
        }
        writer.write_i64::<LittleEndian>(signed_offset(bounds_offset)?)?;
        Ok(())
    }

    /// Number of encoded keys in the buffer
    pub fn key_count(&self) -> usize {
        self.buffer.len() / self.encoding.key_size()
    }

    /// The key implied by the reference frame
    pub fn reference_key(&self) -> Keyframe {
        let [x, y, z, w] = self.reference_frame;
        if self.usage.is_rotation() {
            Keyframe::rotation(Quat::from_xyzw(x, y, z, w), 0)
        } else {
            Keyframe::vector(Vec3::new(x, y, z), 0)
        }
    }

    /// Decode every key; an empty buffer yields the reference key alone
    pub fn keyframes(&self) -> Result<Vec<Keyframe>> {
        if self.buffer.is_empty() {
            return Ok(vec![self.reference_key()]);
        }

        let size = self.encoding.key_size();
        let trailing = self.buffer.len() % size;
        if trailing != 0 {
            return Err(LmtError::TruncatedBuffer {
                field: "keyframe",
                offset: (self.buffer.len() - trailing) as u64,
                needed: size as u64,
                available: trailing as u64,
            });
        }

        self.buffer
            .chunks_exact(size)
            .map(|chunk| self.encoding.decode(chunk, self.bounds.as_ref()))
            .collect()
    }

    /// Replace the buffer with `keys` encoded under the current encoding and bounds
    ///
    /// The buffer is left untouched if any key fails to encode.
    pub fn set_keyframes(&mut self, keys: &[Keyframe]) -> Result<()> {
        let mut buffer = Vec::with_capacity(keys.len() * self.encoding.key_size());
        for key in keys {
            self.encoding.encode(key, self.bounds.as_ref(), &mut buffer)?;
        }
        self.buffer = buffer;
        Ok(())
    }
}

fn non_negative(value: i64, field: &str, offset: u64) -> Result<u64> {
    u64::try_from(value).map_err(|_| LmtError::MalformedHeader {
        offset,
        reason: format!("negative {field} {value}"),
    })
}

fn signed_offset(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| LmtError::ValueOutOfRange {
        field: "channel offset",
        value: offset,
        max: i64::MAX as u64,
    })
}
