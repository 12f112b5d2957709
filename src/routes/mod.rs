use axum::{Json, Router, http::StatusCode, http::Uri, routing::get};
use tower_http::services::ServeDir;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
    uploads::UPLOAD_URL_PREFIX,
};

pub mod auth;
pub mod cart;
pub mod categories;
pub mod customers;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;

/// Every route, the upload directory and the API docs, bound to `state`.
/// Transport layers (tracing, limits, CORS) are added by the binary.
pub fn create_router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest_service(UPLOAD_URL_PREFIX, uploads)
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::success(
        "Not Found",
        serde_json::json!({ "path": uri.path() }),
        Some(Meta::empty()),
    );
    (StatusCode::NOT_FOUND, Json(body))
}
