/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains main entrypoint for the APBH DMA emulator.

--*/

use clap::Parser;
use emulator::{run, DmaDemoArgs};
use simple_logger::SimpleLogger;

fn main() -> anyhow::Result<()> {
    let cli = DmaDemoArgs::parse();
    SimpleLogger::new().with_level(cli.log_level).init()?;

    let summary = run(&cli)?;
    println!(
        "{} transfers, {} bytes, {} spurious completions, {} errors",
        summary.transfers, summary.bytes, summary.spurious, summary.errors
    );
    Ok(())
}
