//! `weld` — multi-variant TypeScript/JavaScript build orchestrator CLI.

use clap::Parser;
use weld_cli::args::CliArgs;
use weld_cli::driver::Driver;
use weld_cli::tracing_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    tracing_config::init(args.verbose);

    let cwd = std::env::current_dir()?;
    let driver = Driver::new(&args, cwd)?;

    let ok = driver.build_all().await?;

    if args.watch {
        driver.watch().await?;
        return Ok(());
    }

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}
