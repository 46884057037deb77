use anyhow::Context;
use clap::Parser;
use crm::domain::config::PipelineConfig;
use crm_board_replay::{Scenario, run};
use std::io::Write;
use std::path::PathBuf;

/// Replays a drag-and-drop scenario against a headless pipeline board.
#[derive(Debug, Parser)]
#[command(name = "crm-board-replay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replays drag-and-drop scenarios against a headless pipeline board")]
struct Cli {
    /// Board configuration file; built-in defaults when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Overrides `store.data_dir`.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Scenario JSON file.
    scenario: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => crm::load(Some(path.as_path())).context("Critical: Configuration is malformed")?,
        None => PipelineConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = data_dir;
    }

    let _log = crm::init_logging(env!("CARGO_PKG_NAME"), &config.log)?;

    let scenario = Scenario::from_file(&cli.scenario)?;
    let report = run(&config, &scenario).await?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("Writing report")?;
    writeln!(stdout)?;
    Ok(())
}
