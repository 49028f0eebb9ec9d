//! Handing decoded channels to an external consumer
//!
//! The codec knows nothing about skeletons or pose spaces. A [`KeyframeSink`]
//! receives each channel's bone identifier, usage and key stream and does
//! whatever conversion its host needs.

use crate::channel::ChannelUsage;
use crate::error::Result;
use crate::keyframe::Keyframe;

/// Consumer of decoded channel streams
pub trait KeyframeSink {
    fn channel(&mut self, bone_id: i32, usage: ChannelUsage, keys: &[Keyframe]) -> Result<()>;
}

/// Absolute frame of each key: the first key sits at frame 0, and every key's
/// delta is added before the next one
pub fn timeline(keys: &[Keyframe]) -> impl Iterator<Item = (u64, &Keyframe)> {
    keys.iter().scan(0u64, |frame, key| {
        let at = *frame;
        *frame += u64::from(key.frame);
        Some((at, key))
    })
}

/// One channel as received by [`ChannelCollector`]
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedChannel {
    pub bone_id: i32,
    pub usage: ChannelUsage,
    pub keys: Vec<Keyframe>,
}

/// Sink that keeps every stream it is given
#[derive(Debug, Clone, Default)]
pub struct ChannelCollector {
    pub channels: Vec<CollectedChannel>,
}

impl ChannelCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Streams received for `bone_id`, in arrival order
    pub fn for_bone(&self, bone_id: i32) -> impl Iterator<Item = &CollectedChannel> {
        self.channels.iter().filter(move |c| c.bone_id == bone_id)
    }
}

impl KeyframeSink for ChannelCollector {
    fn channel(&mut self, bone_id: i32, usage: ChannelUsage, keys: &[Keyframe]) -> Result<()> {
        self.channels.push(CollectedChannel {
            bone_id,
            usage,
            keys: keys.to_vec(),
        });
        Ok(())
    }
}
