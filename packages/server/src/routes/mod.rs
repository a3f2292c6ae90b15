mod v1;

use axum::extract::OriginalUri;
use axum::http::Method;
use utoipa_axum::router::OpenApiRouter;

use crate::error::AppError;
use crate::state::AppState;

/// Everything under `/api`. Unmatched paths answer with the JSON error envelope.
pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/v1", v1::routes())
        .fallback(unknown_endpoint)
}

async fn unknown_endpoint(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("No endpoint for {method} {}", uri.path()))
}
