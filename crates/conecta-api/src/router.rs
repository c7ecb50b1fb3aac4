use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::profiles::MAX_AVATAR_BYTES;
use crate::state::AppState;
use crate::{admin, auth, connections, interests, messages, opportunities, profiles};

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/password-reset", post(auth::request_password_reset))
        .route(
            "/auth/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .route("/roles", get(admin::list_roles));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Profiles
        .route("/profiles", get(profiles::list_profiles))
        .route(
            "/profiles/me",
            get(auth::me)
                .put(profiles::update_me)
                .delete(profiles::delete_me),
        )
        .route(
            "/profiles/me/avatar",
            post(profiles::upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES)),
        )
        .route("/profiles/{user_id}", get(profiles::get_profile))
        // Connections
        .route(
            "/connections",
            get(connections::list_connections).post(connections::request_connection),
        )
        .route(
            "/connections/with/{user_id}",
            get(connections::connection_with),
        )
        .route(
            "/connections/{connection_id}",
            delete(connections::delete_connection),
        )
        .route(
            "/connections/{connection_id}/accept",
            post(connections::accept_connection),
        )
        .route(
            "/connections/{connection_id}/reject",
            post(connections::reject_connection),
        )
        // Messages
        .route("/messages/unread", get(messages::unread_count))
        .route(
            "/messages/{user_id}",
            get(messages::get_conversation).post(messages::send_message),
        )
        // Opportunities & interests
        .route(
            "/opportunities",
            get(opportunities::list_opportunities).post(opportunities::create_opportunity),
        )
        .route(
            "/opportunities/{opportunity_id}",
            get(opportunities::get_opportunity)
                .put(opportunities::update_opportunity)
                .delete(opportunities::delete_opportunity),
        )
        .route(
            "/opportunities/{opportunity_id}/interests",
            get(interests::list_for_opportunity).post(interests::express_interest),
        )
        .route("/interests/mine", get(interests::list_mine))
        .route(
            "/interests/{interest_id}/accept",
            post(interests::accept_interest),
        )
        .route(
            "/interests/{interest_id}/reject",
            post(interests::reject_interest),
        )
        .route(
            "/interests/{interest_id}/withdraw",
            post(interests::withdraw_interest),
        )
        // Admin
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/roles", post(admin::assign_role))
        .route(
            "/admin/users/{user_id}/roles/{role}",
            delete(admin::remove_role),
        )
        .route("/admin/audit-logs", get(admin::audit_logs))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let storage = ServeDir::new(state.storage.root());

    Router::new()
        .route("/health", get(health))
        .nest(
            "/api",
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .nest_service("/storage", storage)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
