pub mod auth;
pub mod error;
mod expenses;
mod groups;
mod validation;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public, except /me)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    // Protected API routes; each handler authenticates through the AuthUser extractor
    let api_routes = Router::new()
        // Groups
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/groups/:id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        // Members
        .route(
            "/groups/:id/members",
            get(groups::list_members).post(groups::add_member),
        )
        .route(
            "/groups/:id/members/:user_id",
            axum::routing::delete(groups::remove_member),
        )
        // Expenses
        .route(
            "/groups/:id/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route(
            "/groups/:id/expenses/:expense_id",
            get(expenses::get_expense).delete(expenses::delete_expense),
        )
        .route(
            "/groups/:id/expenses/:expense_id/splits",
            get(expenses::list_splits),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
