//! Offset layout policies for serialized animation blocks
//!
//! Two revisions of the format disagree on where bounds records go relative to the
//! raw keyframe buffers and on how buffers are padded. Neither is tied to a header
//! version, so every serializing call names the policy it wants.

use std::fmt;

/// Alignment of the first bounds record
pub const BOUNDS_ALIGNMENT: u64 = 8;

/// Alignment of the events subtree and of every table inside it
pub const EVENTS_ALIGNMENT: u64 = 16;

/// Alignment of an animation block appended to a container
pub const BLOCK_ALIGNMENT: u64 = 16;

/// Placement of bounds records relative to keyframe buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundsPlacement {
    BeforeBuffers,
    AfterBuffers,
}

/// How the variable-length parts of a block are ordered and padded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutPolicy {
    pub bounds_placement: BoundsPlacement,
    /// Each non-empty buffer starts on, and is padded to, this boundary
    pub buffer_alignment: u64,
}

impl LayoutPolicy {
    /// Bounds before buffers, buffers padded to 8 bytes
    pub const BOUNDS_FIRST: Self = Self {
        bounds_placement: BoundsPlacement::BeforeBuffers,
        buffer_alignment: 8,
    };

    /// Buffers before bounds, buffers padded to 4 bytes
    pub const BUFFERS_FIRST: Self = Self {
        bounds_placement: BoundsPlacement::AfterBuffers,
        buffer_alignment: 4,
    };
}

impl fmt::Display for LayoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.bounds_placement {
            BoundsPlacement::BeforeBuffers => "bounds before buffers",
            BoundsPlacement::AfterBuffers => "bounds after buffers",
        };
        write!(f, "{order}, {}-byte buffer padding", self.buffer_alignment)
    }
}
