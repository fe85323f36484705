//! Utility to display information about CAP files without loading them
//!
//! Prints the package and applet AIDs, the components that would be sent to
//! the card, the Load File Data Block hash and how the LOAD stream would be
//! split at a given block size.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gpman_globalplatform::{CapFile, LoadCommandStream, LoadOptions, SecurityLevel};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the CAP file to analyze
    cap_file: PathBuf,

    /// Count the Descriptor and Debug components as loaded data
    #[arg(short, long)]
    debug: bool,

    /// Hex dump one component (e.g. `Header`, `Method`)
    #[arg(long)]
    dump_component: Option<String>,

    /// LOAD block size to plan for
    #[arg(long, default_value_t = 255)]
    block_size: usize,

    /// Secure messaging level the LOAD blocks will be sent under
    #[arg(long, value_enum, default_value_t = Level::Mac)]
    level: Level,
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Clear,
    Mac,
    Enc,
}

impl From<Level> for SecurityLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Clear => Self::Clear,
            Level::Mac => Self::Mac,
            Level::Enc => Self::Enc,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cap = CapFile::from_path(&cli.cap_file)?;

    println!("Analyzing CAP file: {}", cli.cap_file.display());
    println!("========================================");

    let (major, minor) = cap.package_version();
    println!("Package AID: {}", cap.package_aid());
    println!("Version:     {major}.{minor}");
    if let Some(name) = cap.package_name() {
        println!("Name:        {name}");
    }

    println!("\nApplets:");
    if cap.applet_aids().is_empty() {
        println!("  None found");
    }
    for (index, aid) in cap.applet_aids().iter().enumerate() {
        println!("  {}. {aid} ({})", index + 1, aid.to_readable_string());
    }

    println!("\nComponents:");
    for component in cap.components(true) {
        let marker = if component.kind().is_debug() && !cli.debug { " (skipped)" } else { "" };
        println!("  {:<13} {:>6} bytes{marker}", component.kind().name(), component.len());
    }

    println!("\nLoad size:   {} bytes", cap.load_size(cli.debug));
    println!("SHA-1:       {}", hex::encode_upper(cap.hash(cli.debug)));

    let options = LoadOptions {
        include_debug: cli.debug,
        block_size: cli.block_size,
        ..LoadOptions::default()
    };
    options.validate()?;
    let stream = LoadCommandStream::new(&cap, &options, cli.level.into())?;
    println!(
        "LOAD blocks: {} ({} bytes in C4 stream)",
        stream.blocks_count(),
        stream.total_len()
    );

    if let Some(name) = &cli.dump_component {
        let Some(component) = cap
            .components(true)
            .find(|component| component.kind().name().eq_ignore_ascii_case(name))
        else {
            println!("\nComponent not found: {name}");
            return Ok(());
        };

        println!("\nContents of {}:", component.kind().name());
        for (i, chunk) in component.as_bytes().chunks(16).enumerate() {
            let ascii: String = chunk
                .iter()
                .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
                .collect();
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            println!("{:08x}  {:<47}  {ascii}", i * 16, bytes.join(" "));
        }
    }

    Ok(())
}
