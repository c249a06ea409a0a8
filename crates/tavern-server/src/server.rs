use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tavern_core::{GameState, Role, Table};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::client::{self, ClientRegistry};
use crate::gateway::BroadcastGateway;
use crate::images::{is_allowed_mime, DirImageLibrary, ImageError, ImageLibrary};
use crate::session::{SessionActor, SessionCommand};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub images_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Gate GM-only events on the handshake role.
    pub enforce_roles: bool,
    /// Start with the demo party instead of an empty table.
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            max_send_queue: 256,
            images_dir: PathBuf::from("public/images"),
            max_upload_bytes: 10 * 1024 * 1024,
            enforce_roles: false,
            seed_demo: false,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub client_registry: Arc<ClientRegistry>,
    pub commands: mpsc::Sender<SessionCommand>,
    pub images: Arc<dyn ImageLibrary>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .nest_service("/images", ServeDir::new(&config.images_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let client_registry = Arc::new(ClientRegistry::new(config.max_send_queue));

    let cleanup = client::start_cleanup_task(
        Arc::clone(&client_registry),
        std::time::Duration::from_secs(60),
    );

    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(1024);

    let images: Arc<dyn ImageLibrary> = Arc::new(DirImageLibrary::new(&config.images_dir));
    let initial = if config.seed_demo {
        GameState::demo()
    } else {
        GameState::default()
    };
    let actor = SessionActor::new(
        Table::new(initial),
        BroadcastGateway::new(Arc::clone(&client_registry)),
        Arc::clone(&images),
        config.enforce_roles,
    );
    let session = tokio::spawn(actor.run(cmd_rx));

    let app_state = AppState {
        client_registry,
        commands: cmd_tx,
        images,
    };

    let router = build_router(app_state, &config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        port = local_addr.port(),
        images_dir = %config.images_dir.display(),
        enforce_roles = config.enforce_roles,
        "Tavern server started"
    );

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _session: session,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _session: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub role: Role,
}

/// WebSocket upgrade handler. The role is fixed for the connection's lifetime.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params.role, state))
}

async fn handle_socket(socket: WebSocket, role: Role, state: AppState) {
    let (connection, rx) = state.client_registry.register();
    tracing::info!(connection_id = %connection, %role, "WebSocket client connected");

    let joined = SessionCommand::Connected {
        connection: connection.clone(),
        role,
    };
    if state.commands.send(joined).await.is_err() {
        state.client_registry.unregister(&connection);
        return;
    }

    client::handle_ws_connection(socket, connection, rx, state.client_registry, state.commands).await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = if state.commands.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else {
        (StatusCode::OK, "healthy")
    };
    let body = serde_json::json!({
        "status": label,
        "connections": state.client_registry.count(),
    });
    (status, axum::Json(body))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no image field in upload")]
    MissingFile,
    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("upload task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingFile | Self::Image(ImageError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Self::Image(ImageError::UnsupportedType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Multipart(e) => e.status(),
            Self::Image(ImageError::Io(_)) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(%status, error = %self, "upload rejected");
        (status, self.to_string()).into_response()
    }
}

/// Accept one image under the multipart field `image`.
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_mime(&content_type) {
            return Err(ImageError::UnsupportedType(content_type).into());
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;

        let images = Arc::clone(&state.images);
        let stored =
            tokio::task::spawn_blocking(move || images.store(&file_name, &content_type, &bytes))
                .await??;

        let _ = state.commands.send(SessionCommand::ImagesChanged).await;
        return Ok((StatusCode::OK, format!("Image uploaded: {stored}")));
    }
    Err(UploadError::MissingFile)
}
