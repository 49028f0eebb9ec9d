use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::Result;

/// Size of a serialized bounds record (4 multipliers, 4 addends)
pub const BOUNDS_SIZE: u64 = 32;

/// Component indices into bounds and quaternion arrays
pub const AXIS_X: usize = 0;
pub const AXIS_Y: usize = 1;
pub const AXIS_Z: usize = 2;
pub const AXIS_W: usize = 3;

/// Per-channel affine dequantization parameters
///
/// A normalized quantized component `q` maps to `add[i] + q * mult[i]`.
/// Components are ordered x, y, z, w.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub mult: [f32; 4],
    pub add: [f32; 4],
}

impl Bounds {
    pub fn new(mult: [f32; 4], add: [f32; 4]) -> Self {
        Self { mult, add }
    }

    /// Bounds that map the normalized `[0, 1]` range onto `[min, max]` per component
    pub fn from_range(min: [f32; 4], max: [f32; 4]) -> Self {
        Self {
            mult: std::array::from_fn(|i| max[i] - min[i]),
            add: min,
        }
    }

    /// Normalized value to final value for one component
    pub fn apply(&self, axis: usize, value: f64) -> f64 {
        f64::from(self.add[axis]) + value * f64::from(self.mult[axis])
    }

    /// Final value back to the normalized domain for one component
    pub fn remove(&self, axis: usize, value: f64) -> f64 {
        let mult = f64::from(self.mult[axis]);
        if mult == 0.0 {
            return 0.0;
        }
        (value - f64::from(self.add[axis])) / mult
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut mult = [0.0; 4];
        for item in &mut mult {
            *item = reader.read_f32::<LittleEndian>()?;
        }
        let mut add = [0.0; 4];
        for item in &mut add {
            *item = reader.read_f32::<LittleEndian>()?;
        }
        Ok(Self { mult, add })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for &value in self.mult.iter().chain(self.add.iter()) {
            writer.write_f32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bounds_parse_write() {
        let bounds = Bounds::new([1.0, 2.0, 0.5, 0.25], [-1.0, 0.0, 3.0, -0.5]);
        let mut data = Vec::new();
        bounds.write(&mut data).unwrap();
        assert_eq!(data.len() as u64, BOUNDS_SIZE);
        assert_eq!(&data[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&data[16..20], &(-1.0f32).to_le_bytes());

        let parsed = Bounds::parse(&mut Cursor::new(data)).unwrap();
        assert_eq!(parsed, bounds);
    }

    #[test]
    fn test_apply_and_remove() {
        let bounds = Bounds::from_range([-1.0, 0.0, 2.0, 0.0], [1.0, 4.0, 2.0, 1.0]);
        assert_eq!(bounds.apply(AXIS_X, 0.5), 0.0);
        assert_eq!(bounds.apply(AXIS_Y, 0.25), 1.0);
        assert_eq!(bounds.remove(AXIS_Y, 1.0), 0.25);
        // Degenerate range always normalizes to zero
        assert_eq!(bounds.remove(AXIS_Z, 7.0), 0.0);
        assert_eq!(bounds.apply(AXIS_Z, 1.0), 2.0);
    }
}
