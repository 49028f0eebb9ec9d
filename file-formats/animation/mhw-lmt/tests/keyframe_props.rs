use glam::{Quat, Vec3};
use mhw_lmt::{Bounds, Keyframe, KeyframeEncoding};
use proptest::prelude::*;

/// Largest decode error for one component, given the bounds multiplier
fn step(encoding: KeyframeEncoding, bounds: Option<&Bounds>) -> f32 {
    let raw = match encoding {
        KeyframeEncoding::SingleVector3
        | KeyframeEncoding::FloatVector3
        | KeyframeEncoding::LinearFloatVector3
        | KeyframeEncoding::FloatVector3Ext => return 0.0,
        KeyframeEncoding::ShortVector3 => 1.0 / 65535.0,
        KeyframeEncoding::ByteVector3 => 1.0 / 255.0,
        KeyframeEncoding::Quat14Bit => 2.0 / 8191.0,
        KeyframeEncoding::Quat7Bit => 1.0 / 127.0,
        KeyframeEncoding::QuatXw14Bit
        | KeyframeEncoding::QuatYw14Bit
        | KeyframeEncoding::QuatZw14Bit => {
            if bounds.is_some() {
                1.0 / 16383.0
            } else {
                1.0 / 2303.0
            }
        }
        KeyframeEncoding::Quat11Bit => 1.0 / 2047.0,
        KeyframeEncoding::Quat9Bit => 1.0 / 511.0,
    };
    let scale = bounds.map_or(1.0, |b| b.mult.iter().fold(0.0f32, |m, v| m.max(v.abs())));
    raw * scale + 1e-5
}

/// A key the encoding can represent: values inside the range it quantizes
fn representable(encoding: KeyframeEncoding, unit: [f32; 4], frame: u32) -> Keyframe {
    let frame = match encoding.frame_bits() {
        0 => 1,
        32 => frame,
        bits => frame % (1 << bits),
    };
    if !encoding.is_rotation() {
        return Keyframe::vector(Vec3::new(unit[0], unit[1], unit[2]), frame);
    }
    let [x, y, z, w] = unit;
    let q = match encoding {
        KeyframeEncoding::Quat14Bit => Quat::from_xyzw(
            x * 4.0 - 2.0,
            y * 4.0 - 2.0,
            z * 4.0 - 2.0,
            w * 4.0 - 2.0,
        ),
        KeyframeEncoding::QuatXw14Bit => Quat::from_xyzw(x * 3.0, 0.0, 0.0, w),
        KeyframeEncoding::QuatYw14Bit => Quat::from_xyzw(0.0, y * 3.0, 0.0, w),
        KeyframeEncoding::QuatZw14Bit => Quat::from_xyzw(0.0, 0.0, z * 3.0, w),
        _ => Quat::from_xyzw(x, y, z, w),
    };
    Keyframe::rotation(q, frame)
}

/// Components a bounded encoding stores, as `[x, y, z, w]` indices
fn decoded_axes(encoding: KeyframeEncoding) -> &'static [usize] {
    match encoding {
        KeyframeEncoding::QuatXw14Bit => &[0, 3],
        KeyframeEncoding::QuatYw14Bit => &[1, 3],
        KeyframeEncoding::QuatZw14Bit => &[2, 3],
        e if e.is_rotation() => &[0, 1, 2, 3],
        _ => &[0, 1, 2],
    }
}

fn encoding_strategy() -> impl Strategy<Value = KeyframeEncoding> {
    proptest::sample::select(KeyframeEncoding::ALL.to_vec())
}

proptest! {
    #[test]
    fn decode_inverts_encode_without_bounds(
        encoding in encoding_strategy(),
        unit in proptest::array::uniform4(0.0f32..=1.0),
        frame in any::<u32>(),
    ) {
        let key = representable(encoding, unit, frame);
        let mut data = Vec::new();
        encoding.encode(&key, None, &mut data).unwrap();
        prop_assert_eq!(data.len(), encoding.key_size());

        let decoded = encoding.decode(&data, None).unwrap();
        prop_assert!(
            decoded.approx_eq(&key, step(encoding, None)),
            "{:?} decoded as {:?}", key, decoded
        );
    }

    #[test]
    fn decode_inverts_encode_with_bounds(
        encoding in encoding_strategy(),
        unit in proptest::array::uniform4(0.0f32..=1.0),
        min in proptest::array::uniform4(-4.0f32..4.0),
        span in proptest::array::uniform4(0.1f32..4.0),
        frame in any::<u32>(),
    ) {
        prop_assume!(encoding.uses_bounds());
        let max: [f32; 4] = std::array::from_fn(|i| min[i] + span[i]);
        let bounds = Bounds::from_range(min, max);

        // Place decoded axes inside the bounded range; the rest stay at identity
        let template = representable(encoding, unit, frame);
        let mut mapped = template.value.components();
        if encoding.is_rotation() {
            mapped = [0.0, 0.0, 0.0, 1.0];
        }
        for &axis in decoded_axes(encoding) {
            mapped[axis] = min[axis] + unit[axis] * span[axis];
        }
        let key = if encoding.is_rotation() {
            Keyframe::rotation(Quat::from_array(mapped), template.frame)
        } else {
            Keyframe::vector(Vec3::new(mapped[0], mapped[1], mapped[2]), template.frame)
        };

        let mut data = Vec::new();
        encoding.encode(&key, Some(&bounds), &mut data).unwrap();
        let decoded = encoding.decode(&data, Some(&bounds)).unwrap();
        prop_assert!(
            decoded.approx_eq(&key, step(encoding, Some(&bounds))),
            "{:?} decoded as {:?}", key, decoded
        );
    }
}
