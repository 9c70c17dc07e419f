pub mod auth;
pub mod invitations;
pub mod notifications;
pub mod ttrs;
pub mod users;

use axum::Router;
use tower_http::services::ServeDir;

use crate::AppState;
use crate::storage::StorageBackend;

pub fn api_router(storage: &StorageBackend) -> Router<AppState> {
    let router = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(ttrs::router())
        .merge(invitations::router())
        .merge(notifications::router());

    match storage.local_upload_dir() {
        Some(dir) => router.nest_service("/api/v1/files", ServeDir::new(dir)),
        None => router,
    }
}
