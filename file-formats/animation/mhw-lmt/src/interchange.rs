//! JSON interchange for animation blocks and events trees
//!
//! Documents mirror the decoded structures with every derived field (offsets,
//! counts, sizes) left out. Type tags and keyframe buffers are hex strings.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::block::{AnimationBlock, BLOCK_RESERVED_WORDS};
use crate::bounds::Bounds;
use crate::channel::{BoneChannel, ChannelUsage};
use crate::error::{LmtError, Result};
use crate::events::{DataRecord, Event, Events, Parameter};
use crate::keyframe::KeyframeEncoding;

/// JSON form of an [`AnimationBlock`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDocument {
    pub frame_count: i32,
    pub loop_frame: i32,
    pub reserved: [i32; BLOCK_RESERVED_WORDS],
    pub channels: Vec<ChannelDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<EventsDocument>,
}

/// JSON form of a [`BoneChannel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelDocument {
    pub encoding: u8,
    pub usage: u8,
    pub joint_type: u8,
    pub reserved: u8,
    pub bone_id: i32,
    pub weight: f32,
    pub buffer: String,
    pub reference_frame: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundsDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsDocument {
    pub mult: [f32; 4],
    pub add: [f32; 4],
}

/// JSON form of an [`Events`] tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsDocument {
    pub reserved: [i32; 8],
    pub events: Vec<EventDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventDocument {
    pub type_tag: String,
    pub parameters: Vec<ParameterDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterDocument {
    pub type_tag: String,
    pub records: Vec<RecordDocument>,
}

/// A data record: five integers, or 20 bytes as hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordDocument {
    Packed([i32; 5]),
    Opaque(String),
}

fn decode_hex(field: &str, text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| LmtError::schema(field, e.to_string()))
}

fn decode_fixed<const N: usize>(field: &str, text: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(field, text)?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        LmtError::schema(field, format!("expected {N} bytes, found {}", bytes.len()))
    })
}

impl From<&AnimationBlock> for BlockDocument {
    fn from(block: &AnimationBlock) -> Self {
        Self {
            frame_count: block.frame_count,
            loop_frame: block.loop_frame,
            reserved: block.reserved,
            channels: block.channels.iter().map(ChannelDocument::from).collect(),
            events: block.events.as_ref().map(EventsDocument::from),
        }
    }
}

impl From<&BoneChannel> for ChannelDocument {
    fn from(channel: &BoneChannel) -> Self {
        Self {
            encoding: channel.encoding.tag(),
            usage: channel.usage.code(),
            joint_type: channel.joint_type,
            reserved: channel.reserved,
            bone_id: channel.bone_id,
            weight: channel.weight,
            buffer: hex::encode(&channel.buffer),
            reference_frame: channel.reference_frame,
            bounds: channel.bounds.map(|b| BoundsDocument {
                mult: b.mult,
                add: b.add,
            }),
        }
    }
}

impl From<&Events> for EventsDocument {
    fn from(events: &Events) -> Self {
        Self {
            reserved: events.reserved,
            events: events
                .events
                .iter()
                .map(|event| EventDocument {
                    type_tag: hex::encode(event.type_tag),
                    parameters: event
                        .parameters
                        .iter()
                        .map(|param| ParameterDocument {
                            type_tag: hex::encode(param.type_tag),
                            records: param
                                .records
                                .iter()
                                .map(|record| match record {
                                    DataRecord::Packed(values) => RecordDocument::Packed(*values),
                                    DataRecord::Opaque(bytes) => {
                                        RecordDocument::Opaque(hex::encode(bytes))
                                    }
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl TryFrom<BlockDocument> for AnimationBlock {
    type Error = LmtError;

    fn try_from(doc: BlockDocument) -> Result<Self> {
        let channels = doc
            .channels
            .into_iter()
            .enumerate()
            .map(|(i, channel)| channel.into_channel(i))
            .collect::<Result<Vec<_>>>()?;
        let events = doc.events.map(Events::try_from).transpose()?;

        Ok(Self {
            frame_count: doc.frame_count,
            loop_frame: doc.loop_frame,
            reserved: doc.reserved,
            channels,
            events,
        })
    }
}

impl ChannelDocument {
    fn into_channel(self, index: usize) -> Result<BoneChannel> {
        let encoding = KeyframeEncoding::from_tag(self.encoding).ok_or_else(|| {
            LmtError::schema(
                format!("channels[{index}].encoding"),
                format!("{} is not a keyframe encoding tag", self.encoding),
            )
        })?;
        let field = format!("channels[{index}].buffer");
        let buffer = decode_hex(&field, &self.buffer)?;
        if buffer.len() % encoding.key_size() != 0 {
            return Err(LmtError::schema(
                field,
                format!(
                    "{} bytes is not a whole number of {}-byte keys",
                    buffer.len(),
                    encoding.key_size()
                ),
            ));
        }

        Ok(BoneChannel {
            encoding,
            usage: ChannelUsage::from_code(self.usage),
            joint_type: self.joint_type,
            reserved: self.reserved,
            bone_id: self.bone_id,
            weight: self.weight,
            buffer,
            reference_frame: self.reference_frame,
            bounds: self.bounds.map(|b| Bounds::new(b.mult, b.add)),
        })
    }
}

impl TryFrom<EventsDocument> for Events {
    type Error = LmtError;

    fn try_from(doc: EventsDocument) -> Result<Self> {
        let mut events = Vec::with_capacity(doc.events.len());
        for (e, event) in doc.events.into_iter().enumerate() {
            let mut parameters = Vec::with_capacity(event.parameters.len());
            for (p, param) in event.parameters.into_iter().enumerate() {
                let field = format!("events[{e}].parameters[{p}]");
                let records = param
                    .records
                    .into_iter()
                    .enumerate()
                    .map(|(r, record)| match record {
                        RecordDocument::Packed(values) => Ok(DataRecord::Packed(values)),
                        RecordDocument::Opaque(text) => {
                            decode_fixed(&format!("{field}.records[{r}]"), &text)
                                .map(DataRecord::Opaque)
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                parameters.push(Parameter {
                    type_tag: decode_fixed(&format!("{field}.type_tag"), &param.type_tag)?,
                    records,
                });
            }
            events.push(Event {
                type_tag: decode_fixed(&format!("events[{e}].type_tag"), &event.type_tag)?,
                parameters,
            });
        }

        Ok(Self {
            reserved: doc.reserved,
            events,
        })
    }
}

fn json_error(error: &serde_json::Error) -> LmtError {
    LmtError::schema(
        format!("line {} column {}", error.line(), error.column()),
        error.to_string(),
    )
}

/// Write `block` as pretty-printed JSON
pub fn export_block<W: Write>(block: &AnimationBlock, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &BlockDocument::from(block)).map_err(|e| json_error(&e))
}

/// Read a block from JSON
pub fn import_block<R: Read>(reader: R) -> Result<AnimationBlock> {
    let doc: BlockDocument = serde_json::from_reader(reader).map_err(|e| json_error(&e))?;
    AnimationBlock::try_from(doc)
}

/// Write an events tree as pretty-printed JSON
pub fn export_events<W: Write>(events: &Events, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &EventsDocument::from(events)).map_err(|e| json_error(&e))
}

/// Read an events tree from JSON
pub fn import_events<R: Read>(reader: R) -> Result<Events> {
    let doc: EventsDocument = serde_json::from_reader(reader).map_err(|e| json_error(&e))?;
    Events::try_from(doc)
}
