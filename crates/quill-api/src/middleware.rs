use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::ErrorPage;
use crate::session::Session;
use crate::views::{self, Frame};

/// Re-render error pages with the caller's navigation, so a logged-in user
/// hitting a 401 or 404 still has a way to log out.
pub async fn session_error_pages(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let identity = Session::from_jar(state.sessions.clone(), &jar)
        .identity()
        .map(str::to_owned);

    let mut response = next.run(req).await;
    if identity.is_none() {
        return response;
    }
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let frame = Frame {
        identity,
        flashes: Vec::new(),
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, views::error_page(&frame, page.status, &page.message)).into_response()
}
