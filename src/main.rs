mod auth;
mod avatar;
mod config;
mod error;
mod models;
mod repository;
mod routes;
mod service;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use axum::{Json, Router, extract::State, routing::get};
use config::Config;
use repository::PgRepository;
use service::auth::{AuthService, spawn_token_sweeper};
use service::invitation::InvitationService;
use service::notification::{ChannelNotifier, NotificationService, spawn_worker};
use service::ttr::TtrService;
use service::user::UserService;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use storage::StorageBackend;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub auth: Arc<AuthService<PgRepository>>,
    pub users: Arc<UserService<PgRepository>>,
    pub ttrs: Arc<TtrService<PgRepository, ChannelNotifier>>,
    pub invitations: Arc<InvitationService<PgRepository, ChannelNotifier>>,
    pub notifications: Arc<NotificationService<PgRepository>>,
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok", "db": row.0 == 1 })))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {o}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&db)
        .await
        .expect("failed to run migrations");

    let repo = PgRepository::new(db.clone());
    let storage = StorageBackend::from_config(&config.upload_dir, config.s3.as_ref());

    let (notifier, queue) = ChannelNotifier::channel(config.notification_queue_size);
    spawn_worker(repo.clone(), queue, info_span!("notification_worker"));
    spawn_token_sweeper(repo.clone(), TOKEN_SWEEP_INTERVAL, info_span!("token_sweeper"));

    let state = AppState {
        db,
        auth: Arc::new(AuthService::new(repo.clone(), &config, info_span!("auth"))),
        users: Arc::new(UserService::new(
            repo.clone(),
            storage.clone(),
            info_span!("users"),
        )),
        ttrs: Arc::new(TtrService::new(
            repo.clone(),
            notifier.clone(),
            info_span!("ttrs"),
        )),
        invitations: Arc::new(InvitationService::new(
            repo.clone(),
            notifier,
            info_span!("invitations"),
        )),
        notifications: Arc::new(NotificationService::new(repo, info_span!("notifications"))),
        config: Arc::new(config),
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .merge(routes::api_router(&storage))
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
