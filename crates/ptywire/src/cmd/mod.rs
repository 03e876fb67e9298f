use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod emit;
pub mod envinfo;
pub mod strip;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame to stdout.
    Emit(EmitArgs),
    /// Extract and print frames from a stream.
    Watch(WatchArgs),
    /// Copy a stream to stdout with frames removed.
    Strip(StripArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Emit(args) => emit::run(args),
        Command::Watch(args) => watch::run(args, format),
        Command::Strip(args) => strip::run(args),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Pipe id to route the frame to.
    pub pipe: String,
    /// JSON payload (validated before encoding).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Stream to read. Defaults to stdin.
    pub path: Option<PathBuf>,
    /// Filter to specific pipe ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub pipes: Option<Vec<String>>,
    /// Exit after extracting N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Forward ordinary output to stdout.
    #[arg(long)]
    pub passthrough: bool,
}

#[derive(Args, Debug)]
pub struct StripArgs {
    /// Stream to read. Defaults to stdin.
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}
