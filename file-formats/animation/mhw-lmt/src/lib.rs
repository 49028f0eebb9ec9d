//! Decoder and encoder for MT Framework LMT motion lists (Monster Hunter: World)
//!
//! An LMT file is a sparse table of animation blocks. Each block holds one
//! keyframe channel per animated bone and an optional events tree. Keyframes are
//! stored in one of thirteen fixed-size encodings, most of them bit-packed and
//! rescaled through a per-channel bounds record.
//!
//! # Examples
//!
//! ```no_run
//! use mhw_lmt::{LayoutPolicy, LmtFile};
//!
//! # fn main() -> Result<(), mhw_lmt::LmtError> {
//! let mut lmt = LmtFile::open("em001.lmt")?;
//!
//! if let Some(mut block) = lmt.get(3)? {
//!     for channel in &block.channels {
//!         println!("bone {} {}: {} keys", channel.bone_id, channel.usage, channel.key_count());
//!     }
//!     block.loop_frame = 0;
//!     lmt.override_animation(3, &block, LayoutPolicy::BOUNDS_FIRST)?;
//! }
//!
//! lmt.save("em001_edited.lmt")?;
//! # Ok(())
//! # }
//! ```
//!
//! Blocks are written with an explicit [`LayoutPolicy`]. The two format revisions
//! in circulation order bounds and buffers differently, and nothing in the file
//! says which one a given container was written with.

pub mod block;
pub mod bounds;
pub mod channel;
pub mod common;
pub mod container;
pub mod error;
pub mod events;
#[cfg(feature = "serde")]
pub mod interchange;
pub mod keyframe;
pub mod layout;
pub mod quantizer;
pub mod sink;
pub mod version;

// Re-export common types
pub use block::{AnimationBlock, BlockLayout, ChannelPlacement};
pub use bounds::Bounds;
pub use channel::{BoneChannel, ChannelUsage, ROOT_BONE_ID};
pub use container::LmtFile;
pub use error::{LmtError, Result};
pub use events::{DataRecord, Event, Events, Parameter, RecordFormat};
pub use keyframe::{KeyValue, Keyframe, KeyframeEncoding};
pub use layout::{BoundsPlacement, LayoutPolicy};
pub use quantizer::{BitReader, BitWriter, Scale, StorageWidth};
pub use sink::{ChannelCollector, KeyframeSink, timeline};
pub use version::LmtVersion;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
