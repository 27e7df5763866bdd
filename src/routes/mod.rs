use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub mod contacts;
pub mod forms;
pub mod health;
pub mod notifications;
pub mod projects;
pub mod properties;
pub mod quotes;
pub mod requests;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(headers))
                .allow_methods(AllowMethods::mirror_request())
                .allow_headers(AllowHeaders::mirror_request())
                .allow_credentials(true)
        }
        None => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
    };

    let form_routes = Router::new()
        .route("/estimate", post(forms::submit_estimate))
        .route("/contact-us", post(forms::submit_contact_us));

    let request_routes = Router::new()
        .route("/", get(requests::list_requests).post(requests::create_request))
        .route(
            "/:id",
            get(requests::get_request).patch(requests::update_request),
        )
        .route("/:id/assign", post(requests::assign_request))
        .route("/:id/auto-assign", post(requests::auto_assign_request))
        .route("/:id/status", post(requests::transition_request))
        .route("/:id/reopen", post(requests::reopen_request))
        .route("/:id/quotes", get(quotes::list_request_quotes));

    let quote_routes = Router::new()
        .route("/", get(quotes::list_quotes).post(quotes::create_quote))
        .route(
            "/:id",
            get(quotes::get_quote)
                .patch(quotes::update_quote)
                .delete(quotes::delete_quote),
        )
        .route("/:id/status", post(quotes::transition_quote));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/from-quote/:quote_id", post(projects::create_from_quote))
        .route(
            "/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/:id/milestones", post(projects::add_milestone))
        .route("/:id/comments", post(projects::add_comment));

    let contact_routes = Router::new()
        .route("/", get(contacts::list_contacts).post(contacts::upsert_contact))
        .route(
            "/:id",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        );

    let property_routes = Router::new()
        .route(
            "/",
            get(properties::list_properties).post(properties::upsert_property),
        )
        .route(
            "/:id",
            get(properties::get_property)
                .patch(properties::update_property)
                .delete(properties::delete_property),
        );

    let notification_routes = Router::new()
        .route("/failed", get(notifications::list_failed))
        .route("/pending", get(notifications::list_pending))
        .route("/:id/requeue", post(notifications::requeue_notification));

    Router::new()
        .nest("/api/forms", form_routes)
        .nest("/api/requests", request_routes)
        .nest("/api/quotes", quote_routes)
        .nest("/api/projects", project_routes)
        .nest("/api/contacts", contact_routes)
        .nest("/api/properties", property_routes)
        .nest("/api/notifications", notification_routes)
        .route("/api/health", get(health::health_check))
        .route("/api/metrics", get(health::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
