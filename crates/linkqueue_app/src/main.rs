mod platform;

use std::path::PathBuf;

use clap::Parser;
use platform::app::{self, RunOptions};
use platform::config::{LogTarget, DEFAULT_CONFIG_FILE};

/// Queue-driven connection harvesting over a remote browser page.
#[derive(Parser)]
#[command(name = "linkqueue")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, env = "LINKQUEUE_CONFIG")]
    config: PathBuf,

    /// Directory holding the persisted queue, records and alarms
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum)]
    log: Option<LogTarget>,

    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    app::run(RunOptions {
        config: cli.config,
        state_dir: cli.state_dir,
        log: cli.log,
        headless: cli.headless,
    })
    .await
}
