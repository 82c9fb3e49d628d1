use std::fs::File;

use anyhow::Context;
use humansize::{format_size, DECIMAL};
use inno_format::loader::{read_version_tag, Offsets};

use crate::cli::InfoArgs;

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let mut file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let offsets = Offsets::load(&mut file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;

    println!("{}", args.file.display());
    match read_version_tag(&mut file, offsets.header_offset) {
        Ok(version) => println!("  version:       {}", version),
        Err(err) => tracing::warn!(error = %err, "version tag unreadable"),
    }
    println!(
        "  declared size: {}",
        format_size(offsets.total_size, DECIMAL)
    );
    println!("  header offset: {:#x}", offsets.header_offset);
    match offsets.data_offset {
        Some(offset) => println!("  data offset:   {:#x}", offset),
        None => println!("  data offset:   external slices (multi-part installer)"),
    }
    println!(
        "  loader exe:    {:#x} ({}, crc {:08x})",
        offsets.exe_offset,
        format_size(offsets.exe_uncompressed_size, DECIMAL),
        offsets.exe_checksum
    );
    Ok(())
}
