use anyhow::Result;
use clap::Parser;
use rewind::cli::{self, Cli};
use rewind::util;
use std::fs::{self, OpenOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        // Log to file (~/.rewind/logs/rewind.log) so the console stays readable
        fs::create_dir_all(util::logs_dir())?;

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(util::log_file_path())?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    cli::run(cli).await
}
