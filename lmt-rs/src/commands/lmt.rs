//! LMT container command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use std::path::{Path, PathBuf};

use mhw_lmt::{AnimationBlock, BoneChannel, Events, LmtFile, RecordFormat, timeline};

use super::{load_block, open_container, read_lmta, write_lmta};
use crate::cli::{LayoutArg, RecordsArg};
use crate::utils::{
    NodeType, TreeNode, TreeOptions, add_table_row, create_table, format_bytes,
    format_component, format_offset, format_type_tag, render_tree,
};

#[derive(Subcommand)]
pub enum LmtCommands {
    /// Display header and slot table of an LMT file
    Info {
        /// Path to the LMT file
        file: PathBuf,
    },

    /// Display one animation block as a tree
    Tree {
        /// Path to the LMT file
        file: PathBuf,

        /// Animation slot
        id: usize,

        /// Maximum depth to display
        #[arg(short, long)]
        depth: Option<usize>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Show metadata inline
        #[arg(short, long)]
        compact: bool,

        /// How event data records are decoded
        #[arg(long, value_enum, default_value_t)]
        records: RecordsArg,
    },

    /// List decoded keyframes of an animation block
    Keys {
        /// Path to the LMT file
        file: PathBuf,

        /// Animation slot
        id: usize,

        /// Only show channels of this bone
        #[arg(short, long, allow_negative_numbers = true)]
        bone: Option<i32>,
    },

    /// Write one animation block to a standalone block file
    Extract {
        /// Path to the LMT file
        file: PathBuf,

        /// Animation slot
        id: usize,

        /// Output block file (defaults to <FILE>.<ID>.lmta)
        output: Option<PathBuf>,

        /// Layout revision to write with
        #[arg(short, long, value_enum)]
        layout: LayoutArg,
    },

    /// Replace one animation block with the contents of a block file
    Replace {
        /// Path to the LMT file
        file: PathBuf,

        /// Animation slot
        id: usize,

        /// Block file to insert
        block: PathBuf,

        /// Layout revision to write with
        #[arg(short, long, value_enum)]
        layout: LayoutArg,

        /// Write the result here instead of overwriting FILE
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Mark an animation slot empty
    Clear {
        /// Path to the LMT file
        file: PathBuf,

        /// Animation slot
        id: usize,

        /// Write the result here instead of overwriting FILE
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn execute(command: LmtCommands) -> Result<()> {
    match command {
        LmtCommands::Info { file } => handle_info(&file),
        LmtCommands::Tree {
            file,
            id,
            depth,
            no_color,
            compact,
            records,
        } => handle_tree(&file, id, depth, no_color, compact, records.into()),
        LmtCommands::Keys { file, id, bone } => handle_keys(&file, id, bone),
        LmtCommands::Extract {
            file,
            id,
            output,
            layout,
        } => handle_extract(&file, id, output, layout),
        LmtCommands::Replace {
            file,
            id,
            block,
            layout,
            output,
        } => handle_replace(&file, id, &block, layout, output),
        LmtCommands::Clear { file, id, output } => handle_clear(&file, id, output),
    }
}

fn handle_info(path: &Path) -> Result<()> {
    let lmt = open_container(path)?;

    println!("{}", style("LMT File Information").bold().cyan());
    println!("{}", style("====================").cyan());
    println!();
    println!("{}: {}", style("File").bold(), path.display());
    println!(
        "{}: {}",
        style("Size").bold(),
        format_bytes(lmt.data().len() as u64)
    );
    println!("{}: {}", style("Version").bold(), lmt.version());
    println!("{}: {}", style("Slots").bold(), lmt.entry_count());

    let populated: Vec<usize> = lmt.populated_ids().collect();
    println!("{}: {}", style("Animations").bold(), populated.len());

    if populated.is_empty() {
        return Ok(());
    }

    println!();
    let mut table = create_table(&["ID", "Offset", "Channels", "Frames", "Loop", "Events"]);
    for id in populated {
        let block = load_block(&lmt, path, id, RecordFormat::Opaque)?;
        let events = block
            .events
            .as_ref()
            .map_or_else(|| "-".to_string(), |e| e.events.len().to_string());
        add_table_row(
            &mut table,
            vec![
                id.to_string(),
                format_offset(lmt.offsets()[id]),
                block.channels.len().to_string(),
                block.frame_count.to_string(),
                block.loop_frame.to_string(),
                events,
            ],
        );
    }
    table.printstd();

    Ok(())
}

fn handle_tree(
    path: &Path,
    id: usize,
    max_depth: Option<usize>,
    no_color: bool,
    compact: bool,
    records: RecordFormat,
) -> Result<()> {
    let lmt = open_container(path)?;
    let block = load_block(&lmt, path, id, records)?;

    let file_name = path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    let root = build_block_tree(format!("{file_name} #{id}"), &block);

    let options = TreeOptions {
        max_depth,
        no_color,
        show_metadata: true,
        compact,
    };
    print!("{}", render_tree(&root, &options));

    Ok(())
}

fn build_block_tree(name: String, block: &AnimationBlock) -> TreeNode {
    let mut root = TreeNode::new(name, NodeType::Root).add_child(
        TreeNode::new("Header", NodeType::Header)
            .with_metadata("frames", block.frame_count)
            .with_metadata("loop", block.loop_frame)
            .with_metadata("channels", block.channels.len()),
    );

    for (index, channel) in block.channels.iter().enumerate() {
        root = root.add_child(channel_node(index, channel));
    }

    if let Some(events) = &block.events {
        root = root.add_child(events_node(events));
    }

    root
}

fn channel_node(index: usize, channel: &BoneChannel) -> TreeNode {
    let mut node = TreeNode::new(
        format!("Channel {index}: bone {} {}", channel.bone_id, channel.usage),
        NodeType::Channel,
    )
    .with_metadata(
        "encoding",
        format!("{:?} ({})", channel.encoding, channel.encoding.tag()),
    )
    .with_metadata("keys", channel.key_count())
    .with_metadata("weight", channel.weight)
    .with_metadata("joint type", channel.joint_type);

    if let Some(bounds) = &channel.bounds {
        node = node.add_child(
            TreeNode::new("Bounds", NodeType::Bounds)
                .with_metadata("mult", format!("{:?}", bounds.mult))
                .with_metadata("add", format!("{:?}", bounds.add)),
        );
    }

    if !channel.buffer.is_empty() {
        node = node.add_child(
            TreeNode::new("Keyframe buffer", NodeType::Data)
                .with_size(channel.buffer.len() as u64),
        );
    }

    node
}

fn events_node(events: &Events) -> TreeNode {
    let mut node = TreeNode::new("Events", NodeType::Events)
        .with_metadata("events", events.events.len())
        .with_metadata("parameters", events.parameter_count())
        .with_metadata("records", events.record_count());

    for event in &events.events {
        let mut event_node = TreeNode::new(format_type_tag(&event.type_tag), NodeType::Event);
        for parameter in &event.parameters {
            let mut parameter_node =
                TreeNode::new(format_type_tag(&parameter.type_tag), NodeType::Parameter);
            for record in &parameter.records {
                let text = match record {
                    mhw_lmt::DataRecord::Packed(values) => format!("{values:?}"),
                    mhw_lmt::DataRecord::Opaque(bytes) => {
                        bytes.iter().map(|b| format!("{b:02x}")).collect()
                    }
                };
                parameter_node = parameter_node.add_child(TreeNode::new(text, NodeType::Data));
            }
            event_node = event_node.add_child(parameter_node);
        }
        node = node.add_child(event_node);
    }

    node
}

fn handle_keys(path: &Path, id: usize, bone: Option<i32>) -> Result<()> {
    let lmt = open_container(path)?;
    let block = load_block(&lmt, path, id, RecordFormat::Opaque)?;

    let mut table = create_table(&["Bone", "Usage", "Key", "Frame", "X", "Y", "Z", "W"]);
    let mut shown = 0usize;

    for channel in block
        .channels
        .iter()
        .filter(|c| bone.is_none_or(|b| c.bone_id == b))
    {
        let keys = channel.keyframes().with_context(|| {
            format!(
                "Failed to decode keyframes of bone {} in animation {id}",
                channel.bone_id
            )
        })?;

        for (index, (frame, key)) in timeline(&keys).enumerate() {
            let [x, y, z, w] = key.value.components();
            add_table_row(
                &mut table,
                vec![
                    channel.bone_id.to_string(),
                    channel.usage.to_string(),
                    index.to_string(),
                    frame.to_string(),
                    format_component(x),
                    format_component(y),
                    format_component(z),
                    format_component(w),
                ],
            );
        }
        shown += 1;
    }

    if shown == 0 {
        println!("No channels found");
        return Ok(());
    }

    table.printstd();
    Ok(())
}

fn handle_extract(
    path: &Path,
    id: usize,
    output: Option<PathBuf>,
    layout: LayoutArg,
) -> Result<()> {
    let lmt = open_container(path)?;
    let block = load_block(&lmt, path, id, RecordFormat::Opaque)?;

    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("{}.{id:03}.lmta", path.display())));
    write_lmta(&block, &output, layout.into())?;

    println!(
        "Extracted animation {id} ({} channels) to {}",
        block.channels.len(),
        output.display()
    );
    Ok(())
}

fn handle_replace(
    path: &Path,
    id: usize,
    block_path: &Path,
    layout: LayoutArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut lmt = open_container(path)?;
    let block = read_lmta(block_path, RecordFormat::Opaque)?;

    let offset = lmt
        .override_animation(id, &block, layout.into())
        .with_context(|| format!("Failed to replace animation {id}"))?;

    let output = output.unwrap_or_else(|| path.to_path_buf());
    save_container(&lmt, &output)?;

    println!(
        "Replaced animation {id} at {} in {}",
        format_offset(offset),
        output.display()
    );
    Ok(())
}

fn handle_clear(path: &Path, id: usize, output: Option<PathBuf>) -> Result<()> {
    let mut lmt = open_container(path)?;
    lmt.clear(id).with_context(|| format!("Failed to clear animation {id}"))?;

    let output = output.unwrap_or_else(|| path.to_path_buf());
    save_container(&lmt, &output)?;

    println!("Cleared animation {id} in {}", output.display());
    Ok(())
}

fn save_container(lmt: &LmtFile, path: &Path) -> Result<()> {
    lmt.save(path)
        .with_context(|| format!("Failed to write LMT file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhw_lmt::{ChannelUsage, Event, KeyframeEncoding, Parameter};

    #[test]
    fn test_block_tree_shape() {
        let mut channel =
            BoneChannel::new(3, ChannelUsage::RotationLocal, KeyframeEncoding::Quat14Bit);
        channel.buffer = vec![0; 16];
        let block = AnimationBlock {
            frame_count: 10,
            channels: vec![channel],
            events: Some(Events {
                reserved: [0; 8],
                events: vec![Event {
                    type_tag: *b"SOUND\0\0\0",
                    parameters: vec![Parameter {
                        type_tag: *b"ID\0\0\0\0\0\0",
                        records: vec![mhw_lmt::DataRecord::Packed([1, 2, 3, 4, 5])],
                    }],
                }],
            }),
            ..AnimationBlock::default()
        };

        let root = build_block_tree("test #0".to_string(), &block);
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1].children.len(), 1);
        assert_eq!(root.children[1].children[0].size, Some(16));

        let output = render_tree(
            &root,
            &TreeOptions {
                no_color: true,
                show_metadata: true,
                ..TreeOptions::default()
            },
        );
        assert!(output.contains("Channel 0: bone 3"));
        assert!(output.contains("encoding: Quat14Bit (6)"));
        assert!(output.contains("SOUND"));
        assert!(output.contains("[1, 2, 3, 4, 5]"));
    }
}
