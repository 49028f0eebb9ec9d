//! JSON interchange command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use mhw_lmt::interchange::{export_block, export_events, import_block, import_events};

use super::{read_lmta, write_lmta};
use crate::cli::{LayoutArg, RecordsArg};

#[derive(Subcommand)]
pub enum JsonCommands {
    /// Export the events tree of a block file as JSON
    ExportEvents {
        /// Block file to read
        block: PathBuf,

        /// JSON file to write
        json: PathBuf,

        /// How event data records are decoded
        #[arg(long, value_enum, default_value_t)]
        records: RecordsArg,
    },

    /// Replace the events tree of a block file with a JSON document
    ImportEvents {
        /// JSON file to read
        json: PathBuf,

        /// Block file to update
        block: PathBuf,

        /// Layout revision to write with
        #[arg(short, long, value_enum)]
        layout: LayoutArg,

        /// Write the result here instead of overwriting BLOCK
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a block file to a JSON document
    ToJson {
        /// Block file to read
        block: PathBuf,

        /// JSON file to write
        json: PathBuf,

        /// How event data records are decoded
        #[arg(long, value_enum, default_value_t)]
        records: RecordsArg,
    },

    /// Build a block file from a JSON document
    FromJson {
        /// JSON file to read
        json: PathBuf,

        /// Block file to write
        block: PathBuf,

        /// Layout revision to write with
        #[arg(short, long, value_enum)]
        layout: LayoutArg,
    },
}

pub fn execute(command: JsonCommands) -> Result<()> {
    match command {
        JsonCommands::ExportEvents {
            block,
            json,
            records,
        } => handle_export_events(&block, &json, records),
        JsonCommands::ImportEvents {
            json,
            block,
            layout,
            output,
        } => handle_import_events(&json, &block, layout, output),
        JsonCommands::ToJson {
            block,
            json,
            records,
        } => handle_to_json(&block, &json, records),
        JsonCommands::FromJson {
            json,
            block,
            layout,
        } => handle_from_json(&json, &block, layout),
    }
}

fn create_json(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open_json(path: &Path) -> Result<BufReader<File>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open JSON file: {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn handle_export_events(block_path: &Path, json_path: &Path, records: RecordsArg) -> Result<()> {
    let block = read_lmta(block_path, records.into())?;
    let Some(events) = &block.events else {
        bail!("Block file {} has no events", block_path.display());
    };

    let mut writer = create_json(json_path)?;
    export_events(events, &mut writer).context("Failed to export events")?;
    writer.flush()?;

    println!(
        "Exported {} events ({} parameters) to {}",
        events.events.len(),
        events.parameter_count(),
        json_path.display()
    );
    Ok(())
}

fn handle_import_events(
    json_path: &Path,
    block_path: &Path,
    layout: LayoutArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let events = import_events(open_json(json_path)?)
        .with_context(|| format!("Failed to import events from {}", json_path.display()))?;
    let mut block = read_lmta(block_path, mhw_lmt::RecordFormat::Opaque)?;

    log::info!(
        "Replacing events of {} with {} events",
        block_path.display(),
        events.events.len()
    );
    block.events = Some(events);

    let output = output.unwrap_or_else(|| block_path.to_path_buf());
    write_lmta(&block, &output, layout.into())?;

    println!("Imported events into {}", output.display());
    Ok(())
}

fn handle_to_json(block_path: &Path, json_path: &Path, records: RecordsArg) -> Result<()> {
    let block = read_lmta(block_path, records.into())?;

    let mut writer = create_json(json_path)?;
    export_block(&block, &mut writer).context("Failed to export block")?;
    writer.flush()?;

    println!(
        "Converted {} ({} channels) to {}",
        block_path.display(),
        block.channels.len(),
        json_path.display()
    );
    Ok(())
}

fn handle_from_json(json_path: &Path, block_path: &Path, layout: LayoutArg) -> Result<()> {
    let block = import_block(open_json(json_path)?)
        .with_context(|| format!("Failed to import block from {}", json_path.display()))?;
    write_lmta(&block, block_path, layout.into())?;

    println!(
        "Converted {} ({} channels) to {}",
        json_path.display(),
        block.channels.len(),
        block_path.display()
    );
    Ok(())
}
