//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::{AspectRatio, InputType};

/// Bulkgen - rate-limited bulk video generation
#[derive(Parser)]
#[command(
    name = "bg",
    about = "Queue many video generations and run them under concurrency and rate limits",
    version,
    after_help = "Logs are written to: ~/.local/share/bulkgen/logs/bulkgen.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Generate a video for every prompt
    Run {
        /// Prompt to generate (repeatable)
        #[arg(short, long = "prompt", value_name = "PROMPT")]
        prompts: Vec<String>,

        /// File with one prompt per line
        #[arg(long, value_name = "FILE")]
        prompts_file: Option<PathBuf>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Write scene prompts for a story topic
    Storyboard {
        /// What the story is about
        topic: String,

        /// Number of scenes
        #[arg(short, long, default_value = "5")]
        scenes: usize,

        /// Character reference image used for every scene
        #[arg(long, value_name = "IMAGE")]
        character: Option<PathBuf>,

        /// Write the scene prompts to FILE for review; feed it back with `run --prompts-file`
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Generate a video for every scene
        #[arg(long)]
        enqueue: bool,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Show logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Options shared by every command that generates videos
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// How each video is seeded
    #[arg(long, default_value = "text-to-video")]
    pub input_type: InputType,

    /// Video model (defaults to genai.model from config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Aspect ratio: 16:9 or 9:16
    #[arg(long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    /// Seed image for image-to-video and frame-to-video
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Override scheduler.max-concurrent
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Retry failed items up to N times once the queue is idle
    #[arg(long, default_value = "0", value_name = "N")]
    pub retry_failed: u32,

    /// Download finished videos (to export.output-dir when DIR is omitted)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    pub export: Option<Option<PathBuf>>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for progress and summaries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Location of the log file written by every command
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bulkgen")
        .join("logs")
        .join("bulkgen.log")
}
