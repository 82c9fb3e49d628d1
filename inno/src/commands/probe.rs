use std::fs::File;
use std::io::Read;

use anyhow::Context;

use crate::cli::ProbeArgs;

pub fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let mut file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mut prefix = [0u8; 0x40];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = file.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    let is_inno = inno_format::probe(&prefix[..filled]);
    if !args.quiet {
        println!(
            "{}: {}",
            args.file.display(),
            if is_inno {
                "Inno Setup installer"
            } else {
                "not an Inno Setup installer"
            }
        );
    }
    if !is_inno {
        std::process::exit(1);
    }
    Ok(())
}
