// ABOUTME: Command-line interface for the relay binary
// ABOUTME: `serve` runs the Slack bot; `chunk` shows where the chunker would split a text

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_core::chunk::{rendered_len, ChunkBounds};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "relay", version, about = "Relay LLM agent output into Slack threads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output logs as JSON instead of human-readable
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Connect to Slack over Socket Mode and answer messages (default)
    Serve,
    /// Print the chunks a text would be split into
    Chunk {
        /// Shortest allowed non-final chunk, in characters
        #[arg(long, default_value_t = ChunkBounds::BLOCK.min)]
        min: usize,
        /// Longest allowed chunk, in characters
        #[arg(long, default_value_t = ChunkBounds::BLOCK.max)]
        max: usize,
        /// File to read; stdin when omitted
        file: Option<PathBuf>,
    },
}

/// Read the whole input from a file, or stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Human-readable chunk listing: a header per chunk followed by its text
pub fn chunk_report(text: &str, bounds: ChunkBounds) -> Result<String> {
    bounds.validate()?;

    let mut out = String::new();
    let mut offset = 0;
    for (i, chunk) in bounds.chunks(text).enumerate() {
        let chars = chunk.chars().count();
        out.push_str(&format!(
            "--- chunk {} (chars {}..{}, rendered length {}) ---\n",
            i + 1,
            offset,
            offset + chars,
            rendered_len(chunk)
        ));
        out.push_str(chunk);
        if !chunk.ends_with('\n') {
            out.push('\n');
        }
        offset += chars;
    }
    Ok(out)
}
