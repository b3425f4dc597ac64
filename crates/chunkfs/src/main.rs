//! chunkfs binary.
//!
//! Usage:
//!   chunkfs [-o opt[,opt...]]... <CHUNK_SIZE> <IMAGE> <MOUNTPOINT>
//!
//! Blocks until the filesystem is unmounted (`fusermount -u MOUNTPOINT`).

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use chunkfs::{Args, ChunkFuse, mount, mount_options, parse_mount_options};
use chunkfs_kernel::{BackingImage, ChunkBackend};

fn main() -> ExitCode {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version land here too, on stdout.
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}, exiting");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let options = parse_mount_options(&args.options)?;

    let image = BackingImage::open(&args.image, args.chunk_size)?;
    let geometry = *image.geometry();
    tracing::info!(
        image = %args.image.display(),
        chunk_size = geometry.chunk_size(),
        total_size = geometry.total_size(),
        chunk_count = geometry.chunk_count(),
        "opened backing image"
    );

    // FUSE callbacks block_on this runtime from the session thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("chunkfs-io")
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let backend = ChunkBackend::new(Arc::new(image));
    let fs = ChunkFuse::new(Arc::new(backend), runtime.handle().clone()).with_ttl(args.ttl());

    mount(fs, &args.mountpoint, &mount_options(options))
        .with_context(|| format!("failed to mount on {}", args.mountpoint.display()))?;

    runtime.shutdown_background();
    Ok(())
}
