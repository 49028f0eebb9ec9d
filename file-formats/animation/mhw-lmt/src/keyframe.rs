//! Keyframe encodings
//!
//! Every bone channel stores its samples in one of thirteen fixed-size layouts,
//! selected by a one-byte tag. Tags 0, 8 and 10 are not part of the format and
//! have no [`KeyframeEncoding`] variant.
//!
//! | tag | bytes | value | frame field | bounds |
//! |-----|-------|-------|-------------|--------|
//! | 1 | 12 | 3×f32 vector | implicit 1 | - |
//! | 2, 3, 9 | 16 | 3×f32 vector | u32 | - |
//! | 4 | 8 | 3×u16 / 65535 vector | u16 | yes |
//! | 5 | 4 | 3×u8 / 255 vector | u8 | yes |
//! | 6 | 8 | w,z,y,x 14-bit signed ×2 | 8 bits | - |
//! | 7 | 4 | w,z,y,x 7-bit unsigned | 4 bits | yes |
//! | 11, 12, 13 | 4 | one axis + w, 14 bits | 4 bits | optional |
//! | 14 | 6 | x,y,z,w 11-bit unsigned | 4 bits | yes |
//! | 15 | 5 | x,y,z,w 9-bit unsigned | 4 bits | yes |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use std::io::{Cursor, Read, Write};

use crate::bounds::{AXIS_W, AXIS_X, AXIS_Y, AXIS_Z, Bounds};
use crate::error::{LmtError, Result};
use crate::quantizer::{BitReader, BitWriter, Scale, StorageWidth, low_mask};

/// Divisor for the w field of axis+w keys stored without bounds
const AXIS_W_FALLBACK_W_SCALE: f64 = 0xFFF as f64;
/// Divisor for the axis field of axis+w keys stored without bounds
const AXIS_W_FALLBACK_AXIS_SCALE: f64 = 0x8FF as f64;
/// Raw axis values above this are folded back down by subtracting it
const AXIS_W_FALLBACK_FOLD: u64 = 0x1FFF;

/// A decoded sample value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyValue {
    Vector(Vec3),
    Rotation(Quat),
}

impl KeyValue {
    /// Human-readable name of the value kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Rotation(_) => "quaternion",
        }
    }

    /// Components as `[x, y, z, w]`; vectors report `w = 0`
    pub fn components(&self) -> [f32; 4] {
        match self {
            Self::Vector(v) => [v.x, v.y, v.z, 0.0],
            Self::Rotation(q) => [q.x, q.y, q.z, q.w],
        }
    }
}

/// One decoded animation sample
///
/// `frame` is the number of frames until the next sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub value: KeyValue,
    pub frame: u32,
}

impl Keyframe {
    pub fn vector(value: Vec3, frame: u32) -> Self {
        Self {
            value: KeyValue::Vector(value),
            frame,
        }
    }

    pub fn rotation(value: Quat, frame: u32) -> Self {
        Self {
            value: KeyValue::Rotation(value),
            frame,
        }
    }

    /// Same kind, same frame, and every component within `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f32) -> bool {
        if self.frame != other.frame || self.value.kind() != other.value.kind() {
            return false;
        }
        self.value
            .components()
            .iter()
            .zip(other.value.components().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Keyframe byte layout, keyed by the channel's encoding tag
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyframeEncoding {
    /// 3×f32, every key advances one frame
    SingleVector3 = 1,
    /// 3×f32 + u32 frame
    FloatVector3 = 2,
    /// 3×f32 + u32 frame
    LinearFloatVector3 = 3,
    /// 3×u16 normalized + u16 frame
    ShortVector3 = 4,
    /// 3×u8 normalized + u8 frame
    ByteVector3 = 5,
    /// 64-bit stream: 4×14-bit signed quaternion + 8-bit frame
    Quat14Bit = 6,
    /// 32-bit stream: 4×7-bit unsigned quaternion + 4-bit frame
    Quat7Bit = 7,
    /// 3×f32 + u32 frame
    FloatVector3Ext = 9,
    /// 32-bit stream: x and w at 14 bits + 4-bit frame
    QuatXw14Bit = 11,
    /// 32-bit stream: y and w at 14 bits + 4-bit frame
    QuatYw14Bit = 12,
    /// 32-bit stream: z and w at 14 bits + 4-bit frame
    QuatZw14Bit = 13,
    /// 3×u16 stream: 4×11-bit unsigned quaternion + 4-bit frame
    Quat11Bit = 14,
    /// 5-byte stream: 4×9-bit unsigned quaternion + 4-bit frame
    Quat9Bit = 15,
}

impl KeyframeEncoding {
    /// Every valid encoding, in tag order
    pub const ALL: [Self; 13] = [
        Self::SingleVector3,
        Self::FloatVector3,
        Self::LinearFloatVector3,
        Self::ShortVector3,
        Self::ByteVector3,
        Self::Quat14Bit,
        Self::Quat7Bit,
        Self::FloatVector3Ext,
        Self::QuatXw14Bit,
        Self::QuatYw14Bit,
        Self::QuatZw14Bit,
        Self::Quat11Bit,
        Self::Quat9Bit,
    ];

    /// Look up an encoding by its tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::SingleVector3),
            2 => Some(Self::FloatVector3),
            3 => Some(Self::LinearFloatVector3),
            4 => Some(Self::ShortVector3),
            5 => Some(Self::ByteVector3),
            6 => Some(Self::Quat14Bit),
            7 => Some(Self::Quat7Bit),
            9 => Some(Self::FloatVector3Ext),
            11 => Some(Self::QuatXw14Bit),
            12 => Some(Self::QuatYw14Bit),
            13 => Some(Self::QuatZw14Bit),
            14 => Some(Self::Quat11Bit),
            15 => Some(Self::Quat9Bit),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Bytes occupied by one key
    pub const fn key_size(self) -> usize {
        match self {
            Self::SingleVector3 => 12,
            Self::FloatVector3 | Self::LinearFloatVector3 | Self::FloatVector3Ext => 16,
            Self::ShortVector3 | Self::Quat14Bit => 8,
            Self::ByteVector3
            | Self::Quat7Bit
            | Self::QuatXw14Bit
            | Self::QuatYw14Bit
            | Self::QuatZw14Bit => 4,
            Self::Quat11Bit => 6,
            Self::Quat9Bit => 5,
        }
    }

    /// Whether keys decode to quaternions
    pub const fn is_rotation(self) -> bool {
        matches!(
            self,
            Self::Quat14Bit
                | Self::Quat7Bit
                | Self::QuatXw14Bit
                | Self::QuatYw14Bit
                | Self::QuatZw14Bit
                | Self::Quat11Bit
                | Self::Quat9Bit
        )
    }

    /// Whether a bounds record rescales decoded values
    pub const fn uses_bounds(self) -> bool {
        !matches!(
            self,
            Self::SingleVector3
                | Self::FloatVector3
                | Self::LinearFloatVector3
                | Self::FloatVector3Ext
                | Self::Quat14Bit
        )
    }

    /// Width of the stored frame delta; 0 when the delta is implicit
    pub const fn frame_bits(self) -> u32 {
        match self {
            Self::SingleVector3 => 0,
            Self::FloatVector3 | Self::LinearFloatVector3 | Self::FloatVector3Ext => 32,
            Self::ShortVector3 => 16,
            Self::ByteVector3 | Self::Quat14Bit => 8,
            Self::Quat7Bit
            | Self::QuatXw14Bit
            | Self::QuatYw14Bit
            | Self::QuatZw14Bit
            | Self::Quat11Bit
            | Self::Quat9Bit => 4,
        }
    }

    /// Decode one key from exactly [`key_size`](Self::key_size) bytes
    pub fn decode(self, bytes: &[u8], bounds: Option<&Bounds>) -> Result<Keyframe> {
        let size = self.key_size();
        if bytes.len() < size {
            return Err(LmtError::TruncatedBuffer {
                field: "keyframe",
                offset: 0,
                needed: size as u64,
                available: bytes.len() as u64,
            });
        }
        let bytes = &bytes[..size];
        let mut reader = Cursor::new(bytes);

        match self {
            Self::SingleVector3 => Ok(Keyframe::vector(read_vec3(&mut reader)?, 1)),
            Self::FloatVector3 | Self::LinearFloatVector3 | Self::FloatVector3Ext => {
                let value = read_vec3(&mut reader)?;
                let frame = reader.read_u32::<LittleEndian>()?;
                Ok(Keyframe::vector(value, frame))
            }
            Self::ShortVector3 => {
                let mut v = [0.0; 3];
                for item in &mut v {
                    *item =
                        Scale::Unsigned.normalize(reader.read_u16::<LittleEndian>()? as u64, 16);
                }
                let frame = reader.read_u16::<LittleEndian>()? as u32;
                Ok(Keyframe::vector(rescale_vector(v, bounds), frame))
            }
            Self::ByteVector3 => {
                let mut v = [0.0; 3];
                for item in &mut v {
                    *item = Scale::Unsigned.normalize(reader.read_u8()? as u64, 8);
                }
                let frame = reader.read_u8()? as u32;
                Ok(Keyframe::vector(rescale_vector(v, bounds), frame))
            }
            Self::Quat14Bit => {
                let mut bits = BitReader::from_le_bytes(bytes, StorageWidth::W64);
                let mut q = IDENTITY;
                for axis in [AXIS_W, AXIS_Z, AXIS_Y, AXIS_X] {
                    q[axis] = bits.take_bits(14, Scale::Signed)? * 2.0;
                }
                let frame = bits.take_raw(8)? as u32;
                Ok(Keyframe::rotation(to_quat(q), frame))
            }
            Self::Quat7Bit => {
                let mut bits = BitReader::from_le_bytes(bytes, StorageWidth::W32);
                let mut q = IDENTITY;
                for axis in [AXIS_W, AXIS_Z, AXIS_Y, AXIS_X] {
                    q[axis] = bits.take_bits(7, Scale::Unsigned)?;
                }
                let frame = bits.take_raw(4)? as u32;
                rescale_axes(&mut q, &ALL_AXES, bounds);
                Ok(Keyframe::rotation(to_quat(q), frame))
            }
            Self::QuatXw14Bit | Self::QuatYw14Bit | Self::QuatZw14Bit => {
                self.decode_axis_w(bytes, bounds)
            }
            Self::Quat11Bit => self.decode_packed_quat(bytes, StorageWidth::W16, 11, bounds),
            Self::Quat9Bit => self.decode_packed_quat(bytes, StorageWidth::W8, 9, bounds),
        }
    }

    /// Append the encoded form of `key` to `out`
    ///
    /// `SingleVector3` has no frame field; only keys with a delta of 1 are accepted.
    pub fn encode(self, key: &Keyframe, bounds: Option<&Bounds>, out: &mut Vec<u8>) -> Result<()> {
        let frame = self.check_frame(key.frame)?;

        match (self, key.value) {
            (Self::SingleVector3, KeyValue::Vector(v)) => write_vec3(out, v),
            (
                Self::FloatVector3 | Self::LinearFloatVector3 | Self::FloatVector3Ext,
                KeyValue::Vector(v),
            ) => {
                write_vec3(out, v)?;
                out.write_u32::<LittleEndian>(frame as u32)?;
                Ok(())
            }
            (Self::ShortVector3, KeyValue::Vector(v)) => {
                for n in unscale_vector(v, bounds) {
                    out.write_u16::<LittleEndian>(Scale::Unsigned.quantize(n, 16) as u16)?;
                }
                out.write_u16::<LittleEndian>(frame as u16)?;
                Ok(())
            }
            (Self::ByteVector3, KeyValue::Vector(v)) => {
                for n in unscale_vector(v, bounds) {
                    out.write_u8(Scale::Unsigned.quantize(n, 8) as u8)?;
                }
                out.write_u8(frame as u8)?;
                Ok(())
            }
            (Self::Quat14Bit, KeyValue::Rotation(q)) => {
                let q = from_quat(q);
                let mut bits = BitWriter::new(1, StorageWidth::W64);
                for axis in [AXIS_W, AXIS_Z, AXIS_Y, AXIS_X] {
                    bits.put_bits(q[axis] / 2.0, 14, Scale::Signed)?;
                }
                bits.put_raw(frame, 8)?;
                out.extend_from_slice(&bits.to_le_bytes());
                Ok(())
            }
            (Self::Quat7Bit, KeyValue::Rotation(q)) => {
                let mut q = from_quat(q);
                unscale_axes(&mut q, &ALL_AXES, bounds);
                let mut bits = BitWriter::new(1, StorageWidth::W32);
                for axis in [AXIS_W, AXIS_Z, AXIS_Y, AXIS_X] {
                    bits.put_bits(q[axis], 7, Scale::Unsigned)?;
                }
                bits.put_raw(frame, 4)?;
                out.extend_from_slice(&bits.to_le_bytes());
                Ok(())
            }
            (Self::QuatXw14Bit | Self::QuatYw14Bit | Self::QuatZw14Bit, KeyValue::Rotation(q)) => {
                self.encode_axis_w(from_quat(q), frame, bounds, out)
            }
            (Self::Quat11Bit, KeyValue::Rotation(q)) => {
                encode_packed_quat(from_quat(q), frame, 3, StorageWidth::W16, 11, bounds, out)
            }
            (Self::Quat9Bit, KeyValue::Rotation(q)) => {
                encode_packed_quat(from_quat(q), frame, 5, StorageWidth::W8, 9, bounds, out)
            }
            (_, value) => Err(LmtError::ValueKindMismatch {
                tag: self.tag(),
                kind: value.kind(),
            }),
        }
    }

    fn check_frame(self, frame: u32) -> Result<u64> {
        let bits = self.frame_bits();
        if bits == 0 {
            if frame != 1 {
                return Err(LmtError::ValueOutOfRange {
                    field: "frame delta",
                    value: u64::from(frame),
                    max: 1,
                });
            }
            return Ok(0);
        }
        let max = low_mask(bits);
        if u64::from(frame) > max {
            return Err(LmtError::ValueOutOfRange {
                field: "frame delta",
                value: u64::from(frame),
                max,
            });
        }
        Ok(u64::from(frame))
    }

    fn named_axis(self) -> usize {
        match self {
            Self::QuatYw14Bit => AXIS_Y,
            Self::QuatZw14Bit => AXIS_Z,
            _ => AXIS_X,
        }
    }

    fn decode_axis_w(self, bytes: &[u8], bounds: Option<&Bounds>) -> Result<Keyframe> {
        let axis = self.named_axis();
        let mut bits = BitReader::from_le_bytes(bytes, StorageWidth::W32);
        let mut q = IDENTITY;

        if let Some(bounds) = bounds {
            q[axis] = bits.take_bits(14, Scale::Unsigned)?;
            q[AXIS_W] = bits.take_bits(14, Scale::Unsigned)?;
            rescale_axes(&mut q, &[axis, AXIS_W], Some(bounds));
        } else {
            q[AXIS_W] = bits.take_raw(14)? as f64 / AXIS_W_FALLBACK_W_SCALE;
            let mut raw = bits.take_raw(14)?;
            if raw > AXIS_W_FALLBACK_FOLD {
                raw -= AXIS_W_FALLBACK_FOLD;
            }
            q[axis] = raw as f64 / AXIS_W_FALLBACK_AXIS_SCALE;
        }

        let frame = bits.take_raw(4)? as u32;
        Ok(Keyframe::rotation(to_quat(q), frame))
    }

    fn encode_axis_w(
        self,
        mut q: [f64; 4],
        frame: u64,
        bounds: Option<&Bounds>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let axis = self.named_axis();
        let mut bits = BitWriter::new(1, StorageWidth::W32);

        if let Some(bounds) = bounds {
            unscale_axes(&mut q, &[axis, AXIS_W], Some(bounds));
            bits.put_bits(q[axis], 14, Scale::Unsigned)?;
            bits.put_bits(q[AXIS_W], 14, Scale::Unsigned)?;
        } else {
            let w = (q[AXIS_W] * AXIS_W_FALLBACK_W_SCALE)
                .round()
                .clamp(0.0, low_mask(14) as f64);
            let a = (q[axis] * AXIS_W_FALLBACK_AXIS_SCALE)
                .round()
                .clamp(0.0, AXIS_W_FALLBACK_FOLD as f64);
            bits.put_raw(w as u64, 14)?;
            bits.put_raw(a as u64, 14)?;
        }

        bits.put_raw(frame, 4)?;
        out.extend_from_slice(&bits.to_le_bytes());
        Ok(())
    }

    fn decode_packed_quat(
        self,
        bytes: &[u8],
        element_width: StorageWidth,
        field_bits: u32,
        bounds: Option<&Bounds>,
    ) -> Result<Keyframe> {
        let mut bits = BitReader::from_le_bytes(bytes, element_width);
        let mut q = IDENTITY;
        for axis in ALL_AXES {
            q[axis] = bits.take_bits(field_bits, Scale::Unsigned)?;
        }
        let frame = bits.take_raw(4)? as u32;
        rescale_axes(&mut q, &ALL_AXES, bounds);
        Ok(Keyframe::rotation(to_quat(q), frame))
    }
}

/// `[x, y, z, w]` of the identity rotation
const IDENTITY: [f64; 4] = [0.0, 0.0, 0.0, 1.0];
const ALL_AXES: [usize; 4] = [AXIS_X, AXIS_Y, AXIS_Z, AXIS_W];

fn encode_packed_quat(
    mut q: [f64; 4],
    frame: u64,
    element_count: usize,
    element_width: StorageWidth,
    field_bits: u32,
    bounds: Option<&Bounds>,
    out: &mut Vec<u8>,
) -> Result<()> {
    unscale_axes(&mut q, &ALL_AXES, bounds);
    let mut bits = BitWriter::new(element_count, element_width);
    for axis in ALL_AXES {
        bits.put_bits(q[axis], field_bits, Scale::Unsigned)?;
    }
    bits.put_raw(frame, 4)?;
    out.extend_from_slice(&bits.to_le_bytes());
    Ok(())
}

fn read_vec3<R: Read>(reader: &mut R) -> Result<Vec3> {
    let x = reader.read_f32::<LittleEndian>()?;
    let y = reader.read_f32::<LittleEndian>()?;
    let z = reader.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> Result<()> {
    writer.write_f32::<LittleEndian>(v.x)?;
    writer.write_f32::<LittleEndian>(v.y)?;
    writer.write_f32::<LittleEndian>(v.z)?;
    Ok(())
}

fn to_quat(q: [f64; 4]) -> Quat {
    Quat::from_xyzw(q[0] as f32, q[1] as f32, q[2] as f32, q[3] as f32)
}

fn from_quat(q: Quat) -> [f64; 4] {
    [
        f64::from(q.x),
        f64::from(q.y),
        f64::from(q.z),
        f64::from(q.w),
    ]
}

fn rescale_axes(q: &mut [f64; 4], axes: &[usize], bounds: Option<&Bounds>) {
    if let Some(bounds) = bounds {
        for &axis in axes {
            q[axis] = bounds.apply(axis, q[axis]);
        }
    }
}

fn unscale_axes(q: &mut [f64; 4], axes: &[usize], bounds: Option<&Bounds>) {
    if let Some(bounds) = bounds {
        for &axis in axes {
            q[axis] = bounds.remove(axis, q[axis]);
        }
    }
}

fn rescale_vector(v: [f64; 3], bounds: Option<&Bounds>) -> Vec3 {
    let mut out = [v[0], v[1], v[2], 0.0];
    rescale_axes(&mut out, &[AXIS_X, AXIS_Y, AXIS_Z], bounds);
    Vec3::new(out[0] as f32, out[1] as f32, out[2] as f32)
}

fn unscale_vector(v: Vec3, bounds: Option<&Bounds>) -> [f64; 3] {
    let mut out = [f64::from(v.x), f64::from(v.y), f64::from(v.z), 0.0];
    unscale_axes(&mut out, &[AXIS_X, AXIS_Y, AXIS_Z], bounds);
    [out[0], out[1], out[2]]
}
