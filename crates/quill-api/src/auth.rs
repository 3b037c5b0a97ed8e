use axum::{
    Form,
    extract::State,
    response::{Redirect, Response},
};
use tracing::{debug, info, warn};

use quill_types::api::{FlashLevel, LoginForm, RegisterForm};

use crate::credentials::CredentialError;
use crate::error::AppError;
use crate::forms::{FormErrors, Validate};
use crate::session::Session;
use crate::{AppState, redirect, render, run_blocking, user_path, views};

pub async fn index() -> Redirect {
    Redirect::to("/register")
}

pub async fn register_form(mut session: Session) -> Response {
    // Already logged in: go home instead of offering a second account.
    if let Some(home) = session.identity().map(user_path) {
        return redirect(session, &home);
    }

    let frame = session.frame();
    let page = views::register(&frame, &RegisterForm::default(), &FormErrors::default());
    render(session, page)
}

pub async fn register(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if let Some(home) = session.identity().map(user_path) {
        return Ok(redirect(session, &home));
    }

    let mut errors = form.validate();
    if errors.is_empty() {
        let st = state.clone();
        let submitted = form.clone();
        match run_blocking(move || st.credentials.register(&st.db, &submitted)).await? {
            Ok(user) => {
                session.login(&user.username)?;
                session.flash(
                    FlashLevel::Success,
                    format!("Welcome, {}! Your account has been created.", user.first_name),
                );
                info!("Registered user {}", user.username);
                return Ok(redirect(session, &user_path(&user.username)));
            }
            Err(CredentialError::DuplicateUsername(username)) => {
                debug!("Registration rejected, {} is taken", username);
                errors.add("username", "Username is already taken.");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let frame = session.frame();
    let page = views::register(&frame, &form, &errors);
    Ok(render(session, page))
}

pub async fn login_form(mut session: Session) -> Response {
    if let Some(home) = session.identity().map(user_path) {
        return redirect(session, &home);
    }

    let frame = session.frame();
    let page = views::login(&frame, &LoginForm::default(), &FormErrors::default());
    render(session, page)
}

pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Some(home) = session.identity().map(user_path) {
        return Ok(redirect(session, &home));
    }

    let mut errors = form.validate();
    if errors.is_empty() {
        let st = state.clone();
        let username = form.username.clone();
        let password = form.password.clone();
        let user = run_blocking(move || st.credentials.authenticate(&st.db, &username, &password))
            .await??;

        match user {
            Some(user) => {
                session.login(&user.username)?;
                session.flash(FlashLevel::Success, format!("Welcome back, {}!", user.first_name));
                info!("User {} logged in", user.username);
                return Ok(redirect(session, &user_path(&user.username)));
            }
            None => {
                warn!("Failed login for {}", form.username);
                errors.add("username", "Invalid username or password.");
            }
        }
    }

    let frame = session.frame();
    let page = views::login(&frame, &form, &errors);
    Ok(render(session, page))
}

/// Logging out without a session is treated as already logged out.
pub async fn logout(mut session: Session) -> Response {
    match session.logout() {
        Ok(username) => {
            info!("User {} logged out", username);
            session.flash(FlashLevel::Info, "You have been logged out.");
        }
        Err(e) => debug!("Logout skipped: {}", e),
    }
    redirect(session, "/login")
}
