use anyhow::{Context, Result};
use bookforge::{BookBuilder, BookConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Build a static HTML book from academic Markdown chapters.
#[derive(Debug, Parser)]
#[command(name = "bookforge", version, about)]
struct Cli {
    /// Book source root.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Configuration file, relative to the root.
    #[arg(short, long, default_value = "book.toml")]
    config: PathBuf,

    /// Override the configured output directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the configured highlight theme.
    #[arg(long)]
    theme: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("error: {e:#}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BookConfig::load(&cli.root.join(&cli.config))
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(theme) = cli.theme {
        config.theme = theme;
    }

    let summary = BookBuilder::new(config, &cli.root)
        .build()
        .context("build failed")?;
    println!(
        "Done: {} chapters rendered, {} skipped",
        summary.rendered, summary.skipped
    );
    Ok(())
}
