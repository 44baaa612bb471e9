use std::process::ExitCode;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use botprobe::config::Config;
use botprobe::harness::{BotController, DispatchRegistry, ResponseCollector, TelegramTransport};
use botprobe::probe::run_probes;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "botprobe.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("botprobe.log"))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting botprobe...");
    info!("Loaded config from {}", config.config_path.display());
    info!("Peer chat: {}, {} probe(s)", config.peer_chat_id, config.probes.len());

    let bot = Bot::new(&config.telegram_bot_token);
    let transport = match TelegramTransport::connect(bot).await {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!("Failed to connect: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = transport.check_peer(config.peer_chat_id).await {
        error!("❌ {e}");
        return ExitCode::FAILURE;
    }

    let registry = Arc::new(DispatchRegistry::new());
    let feed = transport.spawn_update_feed(registry.clone());

    let collector = ResponseCollector::new(registry)
        .with_slot_ceiling(config.slot_ceiling)
        .with_fault_cooldown(config.fault_cooldown);
    let controller = BotController::new(
        transport,
        collector,
        config.peer_chat_id,
        config.policy.clone(),
        config.global_action_delay,
    );

    let all_passed = if config.probes.is_empty() {
        info!("No probes configured, pinging peer");
        match controller.ping(None).await {
            Ok(response) if !response.is_empty() => {
                info!("✅ Peer replied:\n{response}");
                true
            }
            Ok(_) => {
                error!("❌ Peer did not reply");
                false
            }
            Err(e) => {
                error!("❌ Ping failed: {e}");
                false
            }
        }
    } else {
        let reports = run_probes(&controller, &config.probes).await;
        let failed = reports.iter().filter(|r| !r.outcome.passed()).count();
        info!("{} passed, {} failed", reports.len() - failed, failed);
        failed == 0
    };

    feed.abort();

    if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
