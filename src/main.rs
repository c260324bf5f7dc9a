//! zentao-notify - poll ZenTao for new or updated bugs and push them to
//! a Feishu group chat.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use zentao_notify::api::ZentaoClient;
use zentao_notify::config::Config;
use zentao_notify::notify::FeishuNotifier;
use zentao_notify::poller::Poller;
use zentao_notify::state::StateStore;
use zentao_notify::{logging, Result};

#[derive(Parser)]
#[command(name = "zentao-notify")]
#[command(about = "Push new and updated ZenTao bugs to a Feishu group")]
#[command(version)]
struct Cli {
    /// Run a single polling cycle and exit (for cron)
    #[arg(long)]
    once: bool,

    /// Feishu webhook URL (overrides FEISHU_WEBHOOK_URL)
    #[arg(long)]
    webhook: Option<String>,

    /// State file path (overrides STATE_FILE)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Also write logs to a daily-rotated file in the default log directory
    #[arg(long)]
    log_file: bool,

    /// Directory for log files (implies --log-file)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| cli.log_file.then(logging::default_log_directory).flatten());
    if let Err(e) = logging::init(log_dir.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let result = run(cli).await;
    logging::shutdown();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    config.zentao.validate()?;

    let webhook_url = cli.webhook.or_else(|| config.settings.webhook_url.clone());
    let notifier = webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(FeishuNotifier::new)
        .transpose()?;

    let state_file = cli
        .state_file
        .unwrap_or_else(|| config.settings.state_file.clone());
    let client = ZentaoClient::new(config.zentao.credentials())?;
    let poller = Poller::new(
        client,
        notifier,
        StateStore::new(state_file),
        config.zentao.product_ids.clone(),
    );

    if cli.once {
        let outcome = poller.run_once().await;
        info!("Pushed {} bugs", outcome.pushed());
        return Ok(());
    }

    let interval = Duration::from_secs(config.settings.effective_poll_interval());
    poller.run_forever(interval).await;
    Ok(())
}
