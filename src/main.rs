use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

mod archiver;
mod cli;
mod sweeper;

fn main() {
    let cli = cli::Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Off
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    archiver::create_backup(&cli.src, &cli.dst, cli.compression.method())?;
    sweeper::delete_old_backups(&cli.dst, cli.del_days_old)?;
    Ok(())
}
