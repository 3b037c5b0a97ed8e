pub mod auth;
pub mod credentials;
pub mod error;
pub mod feedback;
pub mod forms;
pub mod guard;
pub mod middleware;
pub mod session;
pub mod users;
pub mod views;


use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::error;

use quill_db::Database;

use crate::credentials::Credentials;
use crate::error::AppError;
use crate::session::{Session, SessionKeys};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: Credentials,
    pub sessions: Arc<SessionKeys>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::index))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/users/{username}", get(users::show_user))
        .route("/users/{username}/delete", post(users::delete_user))
        .route(
            "/users/{username}/feedback/add",
            get(feedback::new_feedback_form).post(feedback::create_feedback),
        )
        .route(
            "/feedback/{id}/update",
            get(feedback::edit_feedback_form).post(feedback::update_feedback),
        )
        .route("/feedback/{id}/delete", post(feedback::delete_feedback))
        .layer(from_fn_with_state(state.clone(), middleware::session_error_pages))
        .with_state(state)
}

/// Profile URL for `username`, percent-encoded for use in links and
/// `Location` headers.
pub fn user_path(username: &str) -> String {
    format!("/users/{}", urlencoding::encode(username))
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        AppError::Internal(e.into())
    })
}

pub(crate) fn redirect(session: Session, to: &str) -> Response {
    (session, Redirect::to(to)).into_response()
}

pub(crate) fn render(session: Session, page: Html<String>) -> Response {
    (session, page).into_response()
}
