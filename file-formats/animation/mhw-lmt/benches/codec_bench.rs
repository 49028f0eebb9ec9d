use criterion::{Criterion, criterion_group, criterion_main};
use glam::Quat;
use mhw_lmt::{
    AnimationBlock, BoneChannel, Bounds, ChannelUsage, Keyframe, KeyframeEncoding, LayoutPolicy,
    RecordFormat,
};
use std::hint::black_box;

fn create_test_block() -> AnimationBlock {
    let keys: Vec<Keyframe> = (0..120)
        .map(|i| Keyframe::rotation(Quat::from_rotation_z(i as f32 / 120.0), 1))
        .collect();

    let channels = (0..64)
        .map(|bone| {
            let encoding = if bone % 2 == 0 {
                KeyframeEncoding::Quat11Bit
            } else {
                KeyframeEncoding::Quat14Bit
            };
            let mut channel = BoneChannel::new(bone, ChannelUsage::RotationLocal, encoding);
            if encoding.uses_bounds() {
                channel.bounds = Some(Bounds::from_range([-1.0; 4], [1.0; 4]));
            }
            channel.set_keyframes(&keys).unwrap();
            channel
        })
        .collect();

    AnimationBlock {
        frame_count: 120,
        channels,
        ..AnimationBlock::default()
    }
}

fn bench_block_parse(c: &mut Criterion) {
    let data = create_test_block()
        .to_lmta_bytes(LayoutPolicy::BOUNDS_FIRST)
        .unwrap();

    c.bench_function("parse_block", |b| {
        b.iter(|| AnimationBlock::from_lmta_bytes(black_box(&data), RecordFormat::Packed).unwrap())
    });
}

fn bench_block_serialize(c: &mut Criterion) {
    let block = create_test_block();

    c.bench_function("serialize_block", |b| {
        b.iter(|| {
            black_box(&block)
                .serialize(0x1000, LayoutPolicy::BUFFERS_FIRST)
                .unwrap()
        })
    });
}

fn bench_keyframe_decode(c: &mut Criterion) {
    let block = create_test_block();

    c.bench_function("decode_all_keyframes", |b| {
        b.iter(|| {
            for channel in &black_box(&block).channels {
                black_box(channel.keyframes().unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_block_parse,
    bench_block_serialize,
    bench_keyframe_decode
);
criterion_main!(benches);
