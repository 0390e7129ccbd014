use std::path::Path;
use std::sync::Arc;

use axum::extract::FromRef;
use axum::handler::HandlerWithoutStateExt;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::errors::{handle_errors, handle_panic, not_found_handler, ErrorMode};
use crate::api::{tours, users};
use crate::db::tour_repository::TourRepository;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub tour_repo: Arc<dyn TourRepository>,
    pub error_mode: ErrorMode,
}

impl FromRef<AppState> for ErrorMode {
    fn from_ref(state: &AppState) -> Self {
        state.error_mode
    }
}

/// Routes mounted under `/api/v1`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tours",
            get(tours::list_tours_handler).post(tours::create_tour_handler),
        )
        .route("/tours/top-5-cheap", get(tours::top_cheap_tours_handler))
        .route("/tours/tour-stats", get(tours::tour_stats_handler))
        .route("/tours/monthly-plan/{year}", get(tours::monthly_plan_handler))
        .route(
            "/tours/{id}",
            get(tours::get_tour_handler)
                .patch(tours::update_tour_handler)
                .delete(tours::delete_tour_handler),
        )
        .route(
            "/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/users/{id}",
            get(users::get_user_handler)
                .patch(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .method_not_allowed_fallback(not_found_handler)
}

/// Build the full HTTP router.
///
/// Unmatched paths are looked up in `static_dir` and end in the 404 handler
/// when no file matches. Every error response, panics included, goes through
/// [`handle_errors`].
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let static_files = ServeDir::new(static_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found_handler.into_service());

    Router::new()
        .nest("/api/v1", api_routes())
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    handle_errors,
                ))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .with_state(state)
}
