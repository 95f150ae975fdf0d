use anyhow::Context;
use log::{error, info, warn};
use pool_watcher::alerts::WebhookNotifier;
use pool_watcher::collectors::LogTailer;
use pool_watcher::{Config, Watcher};
use std::sync::atomic::Ordering;

fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration: log_file={}, threshold={}%, window={}, cooldown={:?}",
        config.log_file.display(),
        config.error_rate_threshold,
        config.window_size,
        config.alert_cooldown
    );

    let notifier = WebhookNotifier::new(config.webhook_url.clone(), config.webhook_timeout)
        .context("Failed to initialize webhook notifier")?;
    if !notifier.is_enabled() {
        warn!("SLACK_WEBHOOK_URL not set, alerts will only be logged");
    }

    let mut watcher = Watcher::new(&config, notifier).context("Invalid configuration")?;
    let tailer = LogTailer::new(&config.log_file, config.poll_interval, config.source_wait);

    // Handles SIGINT and, with the termination feature, SIGTERM
    let running = tailer.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping watcher...");
        running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    let result = watcher
        .run(&tailer)
        .with_context(|| format!("Failed to tail {}", config.log_file.display()));

    watcher.stats().log_summary();
    result
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting pool watcher");

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("Pool watcher stopped");
}
