use crate::infra::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use hr_intake::error::AppError;
use hr_intake::integrations::telegram::{event_from_update, Update};
use hr_intake::workflows::intake::{CatalogSource, ChatGateway, ConversationDriver, ResponseSheet};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub(crate) struct WebhookState<C, S, G> {
    driver: Arc<ConversationDriver<C, S, G>>,
    secret: Arc<str>,
}

impl<C, S, G> Clone for WebhookState<C, S, G> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// Health, readiness and metrics; served in both transport modes.
pub(crate) fn ops_routes() -> Router {
    Router::new()
        .route("/", get(healthcheck))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) fn with_webhook_routes<C, S, G>(
    driver: Arc<ConversationDriver<C, S, G>>,
    path: &str,
    secret: &str,
) -> Router
where
    C: CatalogSource + 'static,
    S: ResponseSheet + 'static,
    G: ChatGateway + 'static,
{
    Router::new()
        .route(path, post(webhook_endpoint::<C, S, G>))
        .with_state(WebhookState {
            driver,
            secret: Arc::from(secret),
        })
        .merge(ops_routes())
}

pub(crate) async fn healthcheck(Extension(state): Extension<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "mode": state.mode.label(),
        "webhook_url": state.webhook_url.as_deref().unwrap_or("(not set)"),
    }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn webhook_endpoint<C, S, G>(
    State(hook): State<WebhookState<C, S, G>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError>
where
    C: CatalogSource + 'static,
    S: ResponseSheet + 'static,
    G: ChatGateway + 'static,
{
    if !hook.secret.is_empty() {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(&*hook.secret) {
            warn!("rejected webhook call with a missing or wrong secret token");
            return Err(AppError::Unauthorized);
        }
    }

    let update: Update = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "webhook body is not a valid update");
        AppError::InvalidUpdate(err)
    })?;

    let update_id = update.update_id;
    match event_from_update(update) {
        Some(event) => hook.driver.process(event).await,
        None => debug!(update_id, "ignoring update without a supported payload"),
    }
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use hr_intake::config::TransportMode;
    use hr_intake::workflows::intake::{
        CatalogError, CatalogHandle, CatalogLoader, ChatError, ChatId, DriverSettings,
        JobOpening, OpeningCatalog, OpeningId, OpeningRow, OutgoingMessage, Question, SheetError,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct NoSource;

    #[async_trait]
    impl CatalogSource for NoSource {
        async fn fetch_rows(&self) -> Result<Vec<OpeningRow>, CatalogError> {
            Err(CatalogError::Source("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct NoSheet;

    #[async_trait]
    impl ResponseSheet for NoSheet {
        async fn header_row(&self) -> Result<Vec<String>, SheetError> {
            Ok(Vec::new())
        }

        async fn append_row(&self, _cells: Vec<String>) -> Result<(), SheetError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait]
    impl ChatGateway for Outbox {
        async fn send_message(
            &self,
            chat: ChatId,
            message: &OutgoingMessage,
        ) -> Result<(), ChatError> {
            self.sent
                .lock()
                .expect("outbox mutex")
                .push((chat, message.text.clone()));
            Ok(())
        }

        async fn answer_callback(
            &self,
            _callback_id: &str,
            _text: Option<&str>,
            _show_alert: bool,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn edit_message_text(
            &self,
            _chat: ChatId,
            _message_id: i64,
            _text: &str,
        ) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            mode: TransportMode::Webhook,
            webhook_url: Some("https://bot.example.com/webhook".to_string()),
        }
    }

    fn webhook_app(secret: &str) -> (Router, Arc<Outbox>) {
        let catalog = OpeningCatalog::new(vec![JobOpening {
            id: OpeningId::new("eng"),
            title: "Engineer".to_string(),
            questions: vec![Question {
                key: "city".to_string(),
                prompt: "City?".to_string(),
            }],
        }]);
        let outbox = Arc::new(Outbox::default());
        let driver = Arc::new(ConversationDriver::new(
            Arc::new(CatalogHandle::new(catalog)),
            CatalogLoader::new(Arc::new(NoSource)),
            Arc::new(NoSheet),
            outbox.clone(),
            DriverSettings::default(),
        ));
        let app = with_webhook_routes(driver, "/webhook", secret).layer(Extension(app_state(true)));
        (app, outbox)
    }

    fn myid_update() -> String {
        json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": 42 },
                "from": { "id": 42, "username": "ann" },
                "text": "/myid"
            }
        })
        .to_string()
    }

    fn post_update(body: String, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body)).expect("request builds")
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn webhook_rejects_wrong_secret() {
        let (app, outbox) = webhook_app("s3cret");

        let response = app
            .clone()
            .oneshot(post_update(myid_update(), Some("guess")))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_update(myid_update(), None))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "invalid secret token" })
        );
        assert!(outbox.sent.lock().expect("outbox mutex").is_empty());
    }

    #[tokio::test]
    async fn webhook_processes_update_with_valid_secret() {
        let (app, outbox) = webhook_app("s3cret");

        let response = app
            .oneshot(post_update(myid_update(), Some("s3cret")))
            .await
            .expect("handled");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "ok": true }));
        let sent = outbox.sent.lock().expect("outbox mutex").clone();
        assert_eq!(sent, vec![(ChatId(42), "Your ID: <code>42</code>".to_string())]);
    }

    #[tokio::test]
    async fn webhook_without_secret_accepts_any_caller() {
        let (app, outbox) = webhook_app("");
        let response = app
            .oneshot(post_update(myid_update(), None))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(outbox.sent.lock().expect("outbox mutex").len(), 1);
    }

    #[tokio::test]
    async fn malformed_update_is_a_bad_request() {
        let (app, _) = webhook_app("");
        let response = app
            .oneshot(post_update("{\"not\":\"an update\"}".to_string(), None))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .is_some_and(|message| message.starts_with("invalid update")));
    }

    #[tokio::test]
    async fn health_reports_transport_mode() {
        let (app, _) = webhook_app("");
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).expect("request builds"))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "ok": true,
                "mode": "webhook",
                "webhook_url": "https://bot.example.com/webhook",
            })
        );
    }

    #[tokio::test]
    async fn readiness_tracks_startup_flag() {
        let app = ops_routes().layer(Extension(app_state(false)));
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request builds"))
            .await
            .expect("handled");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await, json!({ "status": "initializing" }));
    }
}
