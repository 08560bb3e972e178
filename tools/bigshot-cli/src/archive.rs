//! `pack`, `list` and `extract` commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use bigshot::ArchiveReader;
use clap::Args;

#[derive(Args)]
pub struct PackArgs {
    /// Directory to pack
    pub dir: PathBuf,

    /// Archive file to write
    pub archive: PathBuf,
}

#[derive(Args)]
pub struct ListArgs {
    /// Archive to read
    pub archive: PathBuf,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Archive to read
    pub archive: PathBuf,

    /// Directory to extract into (created if missing)
    pub dir: PathBuf,
}

pub fn pack(args: PackArgs) -> Result<()> {
    let entries = bigshot::archive::pack(&args.dir, &args.archive).with_context(|| {
        format!(
            "Failed to pack {} into {}",
            args.dir.display(),
            args.archive.display()
        )
    })?;
    tracing::info!("Packed {} files", entries.len());
    Ok(())
}

pub fn list(args: ListArgs) -> Result<()> {
    let reader = ArchiveReader::open(&args.archive)
        .with_context(|| format!("Failed to open archive: {}", args.archive.display()))?;
    for entry in reader.entries() {
        println!("{}\t{}\t{}", entry.key, entry.offset, entry.length);
    }
    Ok(())
}

pub fn extract(args: ExtractArgs) -> Result<()> {
    let mut reader = ArchiveReader::open(&args.archive)
        .with_context(|| format!("Failed to open archive: {}", args.archive.display()))?;
    reader
        .extract_all(&args.dir)
        .with_context(|| format!("Failed to extract into {}", args.dir.display()))?;
    Ok(())
}
