use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::polling;
use crate::routes::{ops_routes, with_webhook_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hr_intake::config::{AppConfig, TransportMode};
use hr_intake::error::AppError;
use hr_intake::integrations::{connect_sheets, TelegramClient};
use hr_intake::telemetry;
use hr_intake::workflows::intake::{
    CatalogHandle, CatalogLoader, ChatId, ConversationDriver, DriverSettings,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(mode) = args.mode.take() {
        config.transport.mode = TransportMode::parse(&mode)?;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        mode: config.transport.mode,
        webhook_url: config.transport.webhook_url.clone(),
    };

    let sheets = Arc::new(connect_sheets(&config.sheets).await?);
    let loader = CatalogLoader::new(sheets.clone());
    // without a valid catalog there is nothing to offer, so startup stops here
    let catalog = loader.load().await?;
    let summary = catalog.summary();
    info!(
        openings = summary.openings,
        questions = summary.questions,
        spreadsheet_id = sheets.spreadsheet_id(),
        "opening catalog loaded"
    );

    let telegram = Arc::new(TelegramClient::new(&config.bot)?);
    let driver = Arc::new(ConversationDriver::new(
        Arc::new(CatalogHandle::new(catalog)),
        loader,
        sheets,
        telegram.clone(),
        DriverSettings {
            admin_ids: config.bot.admin_ids.clone(),
            reviewer_chat: config.bot.reviewer_chat_id.map(ChatId),
            responses_tab: config.sheets.responses_tab.clone(),
        },
    ));
    if config.bot.reviewer_chat_id.is_none() {
        warn!("HR_CHAT_ID is not set; reviewers will not be notified");
    }

    let app = match config.transport.mode {
        TransportMode::Webhook => {
            if let Some(url) = config.transport.webhook_url.as_deref() {
                if let Err(err) = telegram.delete_webhook(true).await {
                    warn!(error = %err, "could not clear the previous webhook");
                }
                telegram
                    .set_webhook(url, Some(config.transport.webhook_secret.as_str()))
                    .await?;
                info!(url, "webhook registered");
            }
            with_webhook_routes(
                driver,
                &config.transport.webhook_path,
                &config.transport.webhook_secret,
            )
        }
        TransportMode::Polling => {
            telegram.delete_webhook(false).await?;
            tokio::spawn(polling::run(telegram, driver));
            ops_routes()
        }
    };
    let app = app.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        mode = config.transport.mode.label(),
        "hr intake bot ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("hr intake bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
