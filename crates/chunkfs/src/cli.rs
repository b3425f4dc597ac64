//! Command line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

/// Mount a file or block device as a tree of fixed-size chunk files.
#[derive(Parser, Debug)]
#[command(name = "chunkfs")]
#[command(about = "Read-only FUSE filesystem exposing an image as fixed-size chunks")]
#[command(version)]
pub struct Args {
    /// Mount options, comma separated (e.g. allow_other,fsname=disk0)
    #[arg(short = 'o', value_name = "OPTIONS", action = ArgAction::Append)]
    pub options: Vec<String>,

    /// Seconds the kernel may cache attributes and lookups
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    pub attr_timeout: u64,

    /// Chunk size in bytes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,

    /// Regular file or block device to expose
    pub image: PathBuf,

    /// Directory to mount on
    pub mountpoint: PathBuf,
}

impl Args {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.attr_timeout)
    }
}
