use axum::{
    extract::{Path, State},
    response::Response,
};
use tracing::info;

use quill_db::StoreError;
use quill_types::api::FlashLevel;
use quill_types::models::{Feedback, User};

use crate::error::AppError;
use crate::guard::require_owner;
use crate::session::Session;
use crate::{AppState, redirect, render, run_blocking, views};

/// GET /users/{username}: the owner's profile and their feedback.
pub async fn show_user(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    require_owner(&session, &username)?;

    // A session can outlive its user if the account was deleted elsewhere.
    let st = state.clone();
    let (user, feedback) = run_blocking(move || -> Result<Option<_>, StoreError> {
        let Some(user) = st.db.find_user(&username)? else {
            return Ok(None);
        };
        let feedback = st.db.feedback_for_user(&username)?;
        Ok(Some((user, feedback)))
    })
    .await??
    .ok_or(AppError::NotFound("User"))?;

    let user = User::from(user);
    let feedback: Vec<Feedback> = feedback.into_iter().map(Feedback::from).collect();

    let frame = session.frame();
    let page = views::profile(&frame, &user, &feedback);
    Ok(render(session, page))
}

/// POST /users/{username}/delete: removes the account and its feedback,
/// then ends the session.
pub async fn delete_user(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    require_owner(&session, &username)?;

    let st = state.clone();
    let target = username.clone();
    if !run_blocking(move || st.db.delete_user(&target)).await?? {
        return Err(AppError::NotFound("User"));
    }

    session.logout()?;
    session.flash(FlashLevel::Info, "Your account has been deleted.");
    info!("Deleted user {} and their feedback", username);
    Ok(redirect(session, "/register"))
}
