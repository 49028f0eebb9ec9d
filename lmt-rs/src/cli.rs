//! Root CLI structure for lmt-rs

use clap::{Parser, Subcommand, ValueEnum};
use mhw_lmt::{LayoutPolicy, RecordFormat};

#[derive(Parser)]
#[command(name = "lmt-rs")]
#[command(about = "Command-line tools for MT Framework LMT animation containers")]
#[command(long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Lmt(crate::commands::lmt::LmtCommands),

    #[command(flatten)]
    Json(crate::commands::json::JsonCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Block layout revision used when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// Bounds records before keyframe buffers, buffers padded to 8 bytes
    BoundsFirst,
    /// Keyframe buffers before bounds records, buffers padded to 4 bytes
    BuffersFirst,
}

impl From<LayoutArg> for LayoutPolicy {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::BoundsFirst => Self::BOUNDS_FIRST,
            LayoutArg::BuffersFirst => Self::BUFFERS_FIRST,
        }
    }
}

/// How event data records are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RecordsArg {
    /// Five 32-bit integers
    #[default]
    Packed,
    /// 20 raw bytes
    Opaque,
}

impl From<RecordsArg> for RecordFormat {
    fn from(arg: RecordsArg) -> Self {
        match arg {
            RecordsArg::Packed => Self::Packed,
            RecordsArg::Opaque => Self::Opaque,
        }
    }
}
