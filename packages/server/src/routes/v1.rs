use axum::routing::get;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/problems", problem_routes())
        .nest("/contests", contest_routes())
        .nest("/submissions", submission_routes())
        .route("/live", get(handlers::live::live))
}

fn problem_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::problem::get_problem))
        .routes(routes!(handlers::submission::create_submission))
}

fn contest_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::contest::register))
        .routes(routes!(handlers::contest::get_participation))
        .routes(routes!(handlers::contest::scoreboard))
        .routes(routes!(handlers::submission::create_contest_submission))
}

fn submission_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::submission::get_submission))
}
