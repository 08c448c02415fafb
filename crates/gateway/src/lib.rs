//! HTTP gateway for helperbot.
//!
//! Routes:
//! - `GET /`: greeting
//! - `GET /health`: liveness
//! - `POST /bot/{token}`: Telegram webhook delivery
//! - `POST /api/v1/chats`: ask a question over plain HTTP
//!
//! Built on Axum. Startup registers the bot's commands and, in production,
//! points the Telegram webhook at this service.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{debug, error, info, warn};

use helperbot_channels::{ChatHandler, TEXT_ONLY_MESSAGE, TelegramChannel};
use helperbot_config::AppConfig;
use helperbot_core::assistant::Assistant;
use helperbot_core::message::ConversationId;

/// Request bodies above this size are rejected.
pub const BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Arc<dyn Assistant>,
    /// Present when a bot token is configured.
    pub telegram: Option<TelegramRoute>,
}

/// What the webhook route needs: the expected token and who handles updates.
pub struct TelegramRoute {
    pub token: String,
    pub handler: Arc<ChatHandler>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/bot/{token}", post(telegram_webhook_handler))
        .route("/api/v1/chats", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS policy from configured origins. `*` allows any origin and mirrors
/// it back with credentials allowed.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Serve the gateway in front of `assistant` until Ctrl-C.
pub async fn serve(
    config: &AppConfig,
    assistant: Arc<dyn Assistant>,
) -> Result<(), Box<dyn std::error::Error>> {
    let telegram = if config.telegram.bot_token.is_empty() {
        warn!("No bot token configured, Telegram webhook disabled");
        None
    } else {
        let channel = Arc::new(TelegramChannel::from_config(&config.telegram));
        prepare_telegram(config, &channel).await;
        let handler = ChatHandler::from_config(channel, assistant.clone(), &config.telegram);
        Some(TelegramRoute {
            token: config.telegram.bot_token.clone(),
            handler: Arc::new(handler),
        })
    };

    let state = Arc::new(GatewayState {
        assistant,
        telegram,
    });
    let app = build_router(state, &config.gateway.cors_origins);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    info!(addr = %addr, environment = config.environment.as_str(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Register commands and sync the webhook. Failures are logged; the HTTP
/// API keeps working without Telegram.
async fn prepare_telegram(config: &AppConfig, channel: &TelegramChannel) {
    info!("Starting up the bot");
    if let Err(e) = channel.register_commands().await {
        error!(error = %e, "Failed to register bot commands");
    }
    if config.uses_webhook() {
        if let Err(e) = channel.ensure_webhook(&config.telegram.webhook_url()).await {
            error!(error = %e, "Failed to set webhook");
        }
    } else {
        debug!("Webhook sync skipped outside production");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down the bot");
}

// --- Handlers ---

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

async fn root_handler() -> Json<MessageResponse> {
    MessageResponse::new("Hello adventurer!")
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Telegram delivers updates here. Anything other than an unknown token is
/// answered with 200 so Telegram does not redeliver.
async fn telegram_webhook_handler(
    State(state): State<SharedState>,
    Path(token): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(route) = state.telegram.as_ref().filter(|r| r.token == token) else {
        warn!("Webhook called with unknown token");
        return StatusCode::NOT_FOUND;
    };

    match TelegramChannel::parse_update(&body) {
        Ok(Some(message)) => {
            debug!(chat_id = %message.chat_id, "Webhook update received");
            if let Err(e) = route.handler.handle(message).await {
                error!(error = %e, "Failed to reply to webhook update");
            }
        }
        Ok(None) => debug!("Ignoring update without a message"),
        Err(e) => warn!(error = %e, "Ignoring malformed webhook update"),
    }
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(alias = "identifier")]
    ip_address: String,
    #[serde(default)]
    query: Option<String>,
}

/// A body that is not a chat request gets the same fixed reply as an empty
/// question; the rejection detail only goes to the log.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<MessageResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(status = %rejection.status(), reason = %rejection.body_text(), "Rejecting chat body");
            return (rejection.status(), MessageResponse::new(TEXT_ONLY_MESSAGE));
        }
    };

    let Some(query) = request.query.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            MessageResponse::new(TEXT_ONLY_MESSAGE),
        );
    };

    let id = ConversationId::new(request.ip_address);
    debug!(conversation = %id, query_len = query.len(), "Chat request");

    match state.assistant.ask(&id, &query).await {
        Ok(answer) => (StatusCode::OK, MessageResponse::new(answer)),
        Err(e) => {
            error!(conversation = %id, error = %e, "Chat request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                MessageResponse::new(e.user_message()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use helperbot_core::channel::{Channel, ChannelId, ChannelMessage, SentMessage};
    use helperbot_core::error::{
        ANSWER_FAILED_MESSAGE, AnswerError, ChannelError, Error, ProviderError,
    };
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const TOKEN: &str = "123:abc";

    struct StubAssistant {
        fail: bool,
        questions: Mutex<Vec<(String, String)>>,
    }

    impl StubAssistant {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                questions: Mutex::new(Vec::new()),
            })
        }

        fn questions(&self) -> Vec<(String, String)> {
            self.questions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Assistant for StubAssistant {
        async fn ask(&self, id: &ConversationId, query: &str) -> helperbot_core::Result<String> {
            self.questions
                .lock()
                .unwrap()
                .push((id.to_string(), query.to_string()));
            if self.fail {
                return Err(Error::from(AnswerError::Generation(ProviderError::Timeout(
                    "120s".into(),
                ))));
            }
            Ok(format!("answer to {query}"))
        }
    }

    /// Swallows everything the handler sends.
    struct SilentChannel {
        id: ChannelId,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for SilentChannel {
        fn name(&self) -> &str {
            "silent"
        }

        fn id(&self) -> &ChannelId {
            &self.id
        }

        async fn start(
            &self,
        ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
            Err(ChannelError::NotConfigured("silent".into()))
        }

        async fn send(
            &self,
            chat_id: &str,
            content: &str,
            _reply_to: Option<&str>,
        ) -> Result<SentMessage, ChannelError> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(SentMessage {
                chat_id: chat_id.into(),
                message_id: "1".into(),
            })
        }

        async fn edit(&self, _message: &SentMessage, content: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn delete(&self, _message: &SentMessage) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn app(assistant: Arc<StubAssistant>) -> (Router, Arc<SilentChannel>) {
        let channel = Arc::new(SilentChannel {
            id: ChannelId("silent".into()),
            sent: Mutex::new(Vec::new()),
        });
        let handler = ChatHandler::new(channel.clone(), assistant.clone(), "Welcome!", "STICKER");
        let state = Arc::new(GatewayState {
            assistant,
            telegram: Some(TelegramRoute {
                token: TOKEN.into(),
                handler: Arc::new(handler),
            }),
        });
        (build_router(state, &["*".to_string()]), channel)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_greets() {
        let (app, _) = app(StubAssistant::new(false));
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": "Hello adventurer!" })
        );
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = app(StubAssistant::new(false));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_returns_answer() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/chats",
                serde_json::json!({ "ip_address": "10.0.0.1", "query": "what is A2SV" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "answer to what is A2SV");
        assert_eq!(
            assistant.questions(),
            vec![("10.0.0.1".to_string(), "what is A2SV".to_string())]
        );
    }

    #[tokio::test]
    async fn chat_accepts_identifier_alias() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/chats",
                serde_json::json!({ "identifier": "session-9", "query": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(assistant.questions()[0].0, "session-9");
    }

    #[tokio::test]
    async fn chat_failure_is_generic() {
        let (app, _) = app(StubAssistant::new(true));
        let response = app
            .oneshot(post_json(
                "/api/v1/chats",
                serde_json::json!({ "ip_address": "x", "query": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], ANSWER_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn chat_rejects_empty_query() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/chats",
                serde_json::json!({ "ip_address": "x", "query": "   " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["message"], TEXT_ONLY_MESSAGE);
        assert!(assistant.questions().is_empty());
    }

    async fn assert_text_only_reply(response: axum::response::Response, status: StatusCode) {
        assert_eq!(response.status(), status);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "message": TEXT_ONLY_MESSAGE })
        );
    }

    #[tokio::test]
    async fn chat_without_query_gets_fixed_reply() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json("/api/v1/chats", serde_json::json!({ "ip_address": "x" })))
            .await
            .unwrap();
        assert_text_only_reply(response, StatusCode::UNPROCESSABLE_ENTITY).await;
        assert!(assistant.questions().is_empty());
    }

    #[tokio::test]
    async fn chat_with_null_query_gets_fixed_reply() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/chats",
                serde_json::json!({ "ip_address": "x", "query": null }),
            ))
            .await
            .unwrap();
        assert_text_only_reply(response, StatusCode::UNPROCESSABLE_ENTITY).await;
        assert!(assistant.questions().is_empty());
    }

    #[tokio::test]
    async fn chat_with_malformed_body_gets_fixed_reply() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/chats")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_text_only_reply(response, StatusCode::BAD_REQUEST).await;
        assert!(assistant.questions().is_empty());
    }

    #[tokio::test]
    async fn webhook_with_wrong_token_is_not_found() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let response = app
            .oneshot(post_json("/bot/wrong", serde_json::json!({ "update_id": 1 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_dispatches_update() {
        let assistant = StubAssistant::new(false);
        let (app, channel) = app(assistant.clone());
        let update = serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 5,
                "chat": { "id": 42, "type": "private" },
                "date": 0,
                "text": "when is the deadline"
            }
        });
        let response = app
            .oneshot(post_json(&format!("/bot/{TOKEN}"), update))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            assistant.questions(),
            vec![("42".to_string(), "when is the deadline".to_string())]
        );
        assert!(
            channel
                .sent
                .lock()
                .unwrap()
                .contains(&"answer to when is the deadline".to_string())
        );
    }

    #[tokio::test]
    async fn webhook_tolerates_garbage() {
        let assistant = StubAssistant::new(false);
        let (app, _) = app(assistant.clone());
        let req = Request::builder()
            .method("POST")
            .uri(format!("/bot/{TOKEN}"))
            .body(Body::from("not json"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(assistant.questions().is_empty());
    }

    #[tokio::test]
    async fn cors_mirrors_origin() {
        let (app, _) = app(StubAssistant::new(false));
        let req = Request::builder()
            .uri("/")
            .header("origin", "https://a2sv.org")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://a2sv.org"
        );
    }

    fn request_from(origin: &str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header("origin", origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn explicit_origins_allow_only_listed() {
        let state = Arc::new(GatewayState {
            assistant: StubAssistant::new(false),
            telegram: None,
        });
        let origins = ["https://a2sv.org".to_string(), "bad\norigin".to_string()];
        let app = build_router(state, &origins);

        let listed = app.clone().oneshot(request_from("https://a2sv.org")).await.unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(
            listed.headers().get("access-control-allow-origin").unwrap(),
            "https://a2sv.org"
        );
        assert_eq!(
            listed.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );

        let unlisted = app.oneshot(request_from("https://evil.example")).await.unwrap();
        assert!(unlisted.headers().get("access-control-allow-origin").is_none());
    }
}
