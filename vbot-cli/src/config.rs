//! CLI argument surface (spec §6): "A configuration object exposes: input
//! selection (broker channel / file / camera / url), output selection
//! (broker / file / stdout), batch flag, frames/time limits, config file
//! path, and bot id." Argument parsing itself is an external collaborator
//! per spec §1 Out-of-scope; this module only specifies the contract the
//! core consumes and fills in defaults from an optional config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "vbot")]
#[command(about = "Video-bot runtime: ingest, analyze and re-publish a video stream")]
pub struct Args {
    /// Broker channel to read from
    #[arg(long, conflicts_with_all = ["input_file", "input_url", "camera"])]
    pub input_channel: Option<String>,
    /// Local file to read from
    #[arg(long, conflicts_with_all = ["input_channel", "input_url", "camera"])]
    pub input_file: Option<PathBuf>,
    /// URL to read from
    #[arg(long, conflicts_with_all = ["input_channel", "input_file", "camera"])]
    pub input_url: Option<String>,
    /// Capture from the local camera device
    #[arg(long, conflicts_with_all = ["input_channel", "input_file", "input_url"])]
    pub camera: bool,

    /// Broker channel to publish to
    #[arg(long, conflicts_with_all = ["output_file", "stdout"])]
    pub output_channel: Option<String>,
    /// Local file to write segments to
    #[arg(long, conflicts_with_all = ["output_channel", "stdout"])]
    pub output_file: Option<PathBuf>,
    /// Write bot messages to stdout instead of a broker/file sink
    #[arg(long, conflicts_with_all = ["output_channel", "output_file"])]
    pub stdout: bool,

    /// Process input as fast as possible instead of at wall-clock rate
    #[arg(long)]
    pub batch: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
    /// Stop after this many seconds
    #[arg(long, value_parser = parse_seconds)]
    pub time_limit: Option<Duration>,

    /// Path to a TOML/YAML/JSON config file merged under the CLI flags
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Bot identifier; also used as the broker channel namespace. May come
    /// from the config file instead of the command line.
    #[arg(long)]
    pub bot_id: Option<String>,

    /// Broker websocket URL, required unless the input/output is purely local
    #[arg(long)]
    pub broker_url: Option<String>,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    s.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("invalid time-limit seconds: {s}"))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileOverrides {
    pub broker_url: Option<String>,
    pub bot_id: Option<String>,
}

/// Loads `args.config_file`, if any, and layers its values underneath the
/// already-parsed CLI flags (flags win on conflict).
pub fn load_file_overrides(args: &Args) -> Result<FileOverrides> {
    let Some(path) = &args.config_file else {
        return Ok(FileOverrides::default());
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .build()
        .with_context(|| format!("reading config file {}", path.display()))?;
    settings
        .try_deserialize()
        .with_context(|| format!("parsing config file {}", path.display()))
}

/// `NODE_ID` (spec §6), falling back to the host name.
pub fn node_id() -> String {
    std::env::var("NODE_ID").unwrap_or_else(|_| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-node".to_string())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    Usage = 1,
    Failure = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_falls_back_to_hostname_when_env_unset() {
        std::env::remove_var("NODE_ID");
        assert!(!node_id().is_empty());
    }

    #[test]
    fn node_id_prefers_environment_override() {
        std::env::set_var("NODE_ID", "node-7");
        assert_eq!("node-7", node_id());
        std::env::remove_var("NODE_ID");
    }
}
