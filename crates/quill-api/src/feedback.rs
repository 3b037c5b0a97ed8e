use axum::{
    Form,
    extract::{FromRequestParts, Path, State},
    http::request::Parts,
    response::Response,
};
use tracing::info;

use quill_types::api::{FeedbackForm, FlashLevel};
use quill_types::models::Feedback;

use crate::error::AppError;
use crate::forms::{FormErrors, Validate};
use crate::guard::require_owner;
use crate::session::Session;
use crate::{AppState, redirect, render, run_blocking, user_path, views};

/// The `{id}` segment of a feedback route. Anything that is not an integer
/// names no feedback, so it is a 404 rather than a bad request.
pub struct FeedbackId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for FeedbackId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Feedback"))?;
        raw.parse().map(FeedbackId).map_err(|_| AppError::NotFound("Feedback"))
    }
}

async fn load_feedback(state: &AppState, id: i64) -> Result<Feedback, AppError> {
    let st = state.clone();
    run_blocking(move || st.db.find_feedback(id))
        .await??
        .map(Feedback::from)
        .ok_or(AppError::NotFound("Feedback"))
}

fn add_action(username: &str) -> String {
    format!("{}/feedback/add", user_path(username))
}

fn update_action(id: i64) -> String {
    format!("/feedback/{id}/update")
}

/// GET /users/{username}/feedback/add
pub async fn new_feedback_form(
    mut session: Session,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    require_owner(&session, &username)?;

    let frame = session.frame();
    let page = views::feedback_form(
        &frame,
        "Add Feedback",
        &add_action(&username),
        &FeedbackForm::default(),
        &FormErrors::default(),
    );
    Ok(render(session, page))
}

/// POST /users/{username}/feedback/add
pub async fn create_feedback(
    State(state): State<AppState>,
    mut session: Session,
    Path(username): Path<String>,
    Form(form): Form<FeedbackForm>,
) -> Result<Response, AppError> {
    require_owner(&session, &username)?;

    let errors = form.validate();
    if !errors.is_empty() {
        let frame = session.frame();
        let page = views::feedback_form(&frame, "Add Feedback", &add_action(&username), &form, &errors);
        return Ok(render(session, page));
    }

    let st = state.clone();
    let owner = username.clone();
    let created = run_blocking(move || st.db.create_feedback(&owner, &form.title, &form.content))
        .await??;

    info!("User {} added feedback {}", username, created.id);
    session.flash(FlashLevel::Success, "Feedback added.");
    Ok(redirect(session, &user_path(&username)))
}

/// GET /feedback/{id}/update
pub async fn edit_feedback_form(
    State(state): State<AppState>,
    mut session: Session,
    FeedbackId(id): FeedbackId,
) -> Result<Response, AppError> {
    let feedback = load_feedback(&state, id).await?;
    require_owner(&session, &feedback.username)?;

    let form = FeedbackForm {
        title: feedback.title,
        content: feedback.content,
    };
    let frame = session.frame();
    let page = views::feedback_form(
        &frame,
        "Edit Feedback",
        &update_action(id),
        &form,
        &FormErrors::default(),
    );
    Ok(render(session, page))
}

/// POST /feedback/{id}/update
pub async fn update_feedback(
    State(state): State<AppState>,
    mut session: Session,
    FeedbackId(id): FeedbackId,
    Form(form): Form<FeedbackForm>,
) -> Result<Response, AppError> {
    let feedback = load_feedback(&state, id).await?;
    require_owner(&session, &feedback.username)?;

    let errors = form.validate();
    if !errors.is_empty() {
        let frame = session.frame();
        let page = views::feedback_form(&frame, "Edit Feedback", &update_action(id), &form, &errors);
        return Ok(render(session, page));
    }

    let st = state.clone();
    let updated = run_blocking(move || st.db.update_feedback(id, &form.title, &form.content))
        .await??
        .ok_or(AppError::NotFound("Feedback"))?;

    info!("User {} updated feedback {}", updated.username, id);
    session.flash(FlashLevel::Success, "Feedback updated.");
    Ok(redirect(session, &user_path(&updated.username)))
}

/// POST /feedback/{id}/delete
pub async fn delete_feedback(
    State(state): State<AppState>,
    mut session: Session,
    FeedbackId(id): FeedbackId,
) -> Result<Response, AppError> {
    let feedback = load_feedback(&state, id).await?;
    require_owner(&session, &feedback.username)?;

    let st = state.clone();
    if !run_blocking(move || st.db.delete_feedback(id)).await?? {
        return Err(AppError::NotFound("Feedback"));
    }

    info!("User {} deleted feedback {}", feedback.username, id);
    session.flash(FlashLevel::Info, "Feedback deleted.");
    Ok(redirect(session, &user_path(&feedback.username)))
}
