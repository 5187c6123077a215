//! di - get information from disk images
//!
//! Thin front end over the `diskimage` library: opens the image, prints the
//! filesystems found and, at higher verbosity, every enumerated item.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use diskimage::{DiskImage, DiskImageOptions, Verbosity};

/// Get information from disk images
#[derive(Parser)]
#[command(name = "di")]
#[command(version)]
#[command(about = "Get information from disk-images", long_about = None)]
struct Cli {
    /// Disk image file (further segments are discovered automatically)
    diskimagefile: PathBuf,

    /// Add verbosity, -vv to enable debugging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit items as JSON lines instead of the text listing
    #[arg(long)]
    json: bool,

    /// Do not memory-map segment files
    #[arg(long)]
    no_mmap: bool,
}

fn main() {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_count(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.env_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli, verbosity) {
        eprintln!("*ERROR* {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli, verbosity: Verbosity) -> Result<()> {
    let options = DiskImageOptions {
        verbosity,
        use_mmap: !cli.no_mmap,
    };

    let image = DiskImage::from_file(&cli.diskimagefile, &options).with_context(|| {
        format!(
            "file {} is not a supported diskimage",
            cli.diskimagefile.display()
        )
    })?;

    if cli.json {
        return print_json(&image);
    }

    if image.filesystems().is_empty() {
        println!("Found no supported filesystems in this diskimage.");
        return Ok(());
    }

    println!("[*] Filesystems found:");
    for (i, entry) in image.filesystems().iter().enumerate() {
        println!(
            "{}. offset={} filesystem={}",
            i,
            entry.volume.start_offset,
            entry.filesystem.identify()
        );
    }

    if verbosity >= Verbosity::Verbose {
        println!("[*] Items:");
        for result in image.get_items() {
            match result {
                Ok(item) => println!("{}", item),
                Err(e) => eprintln!("*WARN* skipping corrupt entry: {}", e),
            }
        }
    }

    Ok(())
}

fn print_json(image: &DiskImage) -> Result<()> {
    for result in image.get_items() {
        match result {
            Ok(item) => println!("{}", serde_json::to_string(&item)?),
            Err(e) => eprintln!("*WARN* skipping corrupt entry: {}", e),
        }
    }
    Ok(())
}
