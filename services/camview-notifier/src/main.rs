use camview_notifier::{logging, run};
use camview_service::NotifierConfig;

#[tokio::main]
async fn main() {
    let config = match NotifierConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.logging);

    match run(&config).await {
        Ok(report) => {
            tracing::info!(
                scanned = report.scanned,
                skipped = report.skipped,
                notified = report.notified,
                failed = report.failed,
                pruned = report.pruned,
                "Notification pass complete"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "Notifier failed to start");
            std::process::exit(1);
        }
    }
}
