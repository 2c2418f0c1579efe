//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run the bot.
//! No business logic here.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tg_broadcast::adapters::access::StaticAdminList;
use tg_broadcast::adapters::bot::BotRouter;
use tg_broadcast::adapters::persistence::JsonStore;
use tg_broadcast::adapters::telegram::BotApiGateway;
use tg_broadcast::ports::{AccessPolicy, BotGateway, InputPort, MessageSender, PublicationStore};
use tg_broadcast::shared::config::AppConfig;
use tg_broadcast::usecases::{AdminService, AuthoringService, DispatchService, SchedulerService};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load()?;
    let Some(token) = cfg.bot_token.clone().filter(|t| !t.trim().is_empty()) else {
        anyhow::bail!("Set TG_BROADCAST_BOT_TOKEN or BOT_TOKEN (env or .env). Get one from @BotFather");
    };

    let admins = cfg.admin_ids();
    if admins.is_empty() {
        warn!("no admin ids configured; every admin command will be refused");
    }
    let access: Arc<dyn AccessPolicy> = Arc::new(StaticAdminList::new(admins.iter().copied()));

    // --- Store (self-healing load) ---
    let state_path = cfg.state_file_or_default();
    if let Some(parent) = state_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| anyhow::anyhow!("create data dir {}: {}", parent.display(), e))?;
    }
    let store: Arc<dyn PublicationStore> = Arc::new(JsonStore::open(&state_path).await);
    info!(path = %state_path.display(), "publication store ready");

    // --- Transport ---
    let gateway = Arc::new(
        BotApiGateway::new(
            &cfg.api_url_or_default(),
            &token,
            cfg.poll_timeout_secs_or_default(),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let username = gateway
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("bot token rejected: {}", e))?;
    info!(bot = %username, admins = admins.len(), "connected to Telegram");
    let sender: Arc<dyn MessageSender> = gateway.clone();
    let bot: Arc<dyn BotGateway> = gateway;

    // --- Services ---
    let reschedule = Arc::new(Notify::new());
    let dispatcher = Arc::new(DispatchService::new(
        sender,
        Arc::clone(&store),
        cfg.dispatch_concurrency_or_default(),
        cfg.delivery_timeout_or_default(),
    ));

    let scheduler = SchedulerService::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        cfg.zone_or_default(),
        cfg.tick_or_default(),
        Arc::clone(&reschedule),
    );
    let scheduler_task = tokio::spawn(async move {
        scheduler.run_loop().await;
    });

    let authoring = Arc::new(AuthoringService::new(
        Arc::clone(&store),
        cfg.session_ttl_or_default(),
        reschedule,
    ));
    let admin = Arc::new(AdminService::new(store, dispatcher, authoring, access));
    let input_port: Arc<dyn InputPort> = Arc::new(BotRouter::new(bot, admin));

    // --- Run until Ctrl+C ---
    tokio::select! {
        res = input_port.run() => res.map_err(|e| anyhow::anyhow!("{}", e))?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }
    scheduler_task.abort();
    Ok(())
}
