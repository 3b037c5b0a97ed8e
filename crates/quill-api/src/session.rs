//! Per-request session context.
//!
//! The client's identity and pending notices travel in a signed HS256 token
//! stored in the `quill_session` cookie. [`Session`] is extracted from the
//! request, mutated by the handler, and written back as a response part, so
//! no session state lives in the process between requests.
//!
//! A cookie that fails to decode (bad signature, expired, garbage) is read as
//! an anonymous session with no notices.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::{debug, error};

use quill_types::api::{Flash, FlashLevel, SessionClaims};

use crate::AppState;
use crate::views::Frame;

pub const SESSION_COOKIE: &str = "quill_session";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("already logged in as `{0}`")]
    AlreadyAuthenticated(String),

    #[error("no active session")]
    NoActiveSession,
}

/// Signing keys and cookie settings, shared by every request.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: chrono::Duration, secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            secure,
        }
    }

    fn encode(&self, username: Option<String>, flashes: Vec<Flash>) -> jsonwebtoken::errors::Result<String> {
        let claims = SessionClaims {
            username,
            flashes,
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    fn decode(&self, token: &str) -> jsonwebtoken::errors::Result<SessionClaims> {
        Ok(decode::<SessionClaims>(token, &self.decoding, &Validation::default())?.claims)
    }

    fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .into()
    }
}

/// Session state for one request: `Anonymous` when `identity` is `None`,
/// `Authenticated(username)` otherwise.
pub struct Session {
    keys: Arc<SessionKeys>,
    identity: Option<String>,
    flashes: Vec<Flash>,
    had_cookie: bool,
}

impl Session {
    pub fn anonymous(keys: Arc<SessionKeys>) -> Self {
        Self {
            keys,
            identity: None,
            flashes: Vec::new(),
            had_cookie: false,
        }
    }

    pub fn from_jar(keys: Arc<SessionKeys>, jar: &CookieJar) -> Self {
        let mut session = Self::anonymous(keys);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return session;
        };

        session.had_cookie = true;
        match session.keys.decode(cookie.value()) {
            Ok(claims) => {
                session.identity = claims.username;
                session.flashes = claims.flashes;
            }
            Err(e) => debug!("Ignoring session cookie: {}", e),
        }
        session
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// `Anonymous -> Authenticated(username)`. Switching identities without
    /// a logout in between is refused.
    pub fn login(&mut self, username: &str) -> Result<(), SessionError> {
        if let Some(current) = &self.identity {
            return Err(SessionError::AlreadyAuthenticated(current.clone()));
        }
        self.identity = Some(username.to_string());
        Ok(())
    }

    /// `Authenticated(username) -> Anonymous`, returning the old identity.
    pub fn logout(&mut self) -> Result<String, SessionError> {
        self.identity.take().ok_or(SessionError::NoActiveSession)
    }

    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }

    /// Page context for a render. Drains the notice queue, so each notice is
    /// shown exactly once.
    pub fn frame(&mut self) -> Frame {
        Frame {
            identity: self.identity.clone(),
            flashes: std::mem::take(&mut self.flashes),
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Session::from_jar(state.sessions.clone(), &jar))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let cookie = if self.identity.is_none() && self.flashes.is_empty() {
            if !self.had_cookie {
                return Ok(res);
            }
            let mut removal: Cookie<'static> = Cookie::build((SESSION_COOKIE, "")).path("/").into();
            removal.make_removal();
            removal
        } else {
            match self.keys.encode(self.identity, self.flashes) {
                Ok(token) => self.keys.cookie(token),
                Err(e) => {
                    error!("Failed to encode session cookie: {}", e);
                    return Ok(res);
                }
            }
        };

        CookieJar::new().add(cookie).into_response_parts(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header::{COOKIE, SET_COOKIE}};
    use axum::response::IntoResponse;

    fn keys(secret: &[u8]) -> Arc<SessionKeys> {
        Arc::new(SessionKeys::new(secret, chrono::Duration::hours(1), false))
    }

    /// Write the session into a response and read it back as the next
    /// request would.
    fn round_trip(session: Session, keys: Arc<SessionKeys>) -> (Session, Option<String>) {
        let response = (session, "ok").into_response();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());

        let mut headers = HeaderMap::new();
        if let Some(raw) = &set_cookie {
            let pair = raw.split(';').next().unwrap();
            headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        }
        let next = Session::from_jar(keys, &CookieJar::from_headers(&headers));
        (next, set_cookie)
    }

    #[test]
    fn login_then_logout() {
        let mut session = Session::anonymous(keys(b"secret"));
        assert_eq!(session.identity(), None);

        session.login("alice").unwrap();
        assert_eq!(session.identity(), Some("alice"));

        assert_eq!(session.logout(), Ok("alice".to_string()));
        assert_eq!(session.identity(), None);
    }

    #[test]
    fn cannot_switch_identity_without_logout() {
        let mut session = Session::anonymous(keys(b"secret"));
        session.login("alice").unwrap();
        assert_eq!(
            session.login("bob"),
            Err(SessionError::AlreadyAuthenticated("alice".into()))
        );
        assert_eq!(session.identity(), Some("alice"));
    }

    #[test]
    fn logout_without_session_fails() {
        let mut session = Session::anonymous(keys(b"secret"));
        assert_eq!(session.logout(), Err(SessionError::NoActiveSession));
    }

    #[test]
    fn identity_survives_the_cookie() {
        let keys = keys(b"secret");
        let mut session = Session::anonymous(keys.clone());
        session.login("alice").unwrap();

        let (next, set_cookie) = round_trip(session, keys);
        let set_cookie = set_cookie.unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert_eq!(next.identity(), Some("alice"));
    }

    #[test]
    fn flashes_are_shown_once() {
        let keys = keys(b"secret");
        let mut session = Session::anonymous(keys.clone());
        session.login("alice").unwrap();
        session.flash(FlashLevel::Success, "Welcome!");

        // A redirect carries the notice forward untouched.
        let (mut next, _) = round_trip(session, keys.clone());
        let frame = next.frame();
        assert_eq!(frame.flashes.len(), 1);
        assert_eq!(frame.flashes[0].message, "Welcome!");

        // Once rendered it is gone.
        let (mut after, _) = round_trip(next, keys);
        assert!(after.frame().flashes.is_empty());
        assert_eq!(after.identity(), Some("alice"));
    }

    #[test]
    fn cookie_signed_with_another_key_is_anonymous() {
        let mut session = Session::anonymous(keys(b"attacker"));
        session.login("alice").unwrap();

        let (next, _) = round_trip(session, keys(b"secret"));
        assert_eq!(next.identity(), None);
    }

    #[test]
    fn empty_session_clears_an_existing_cookie() {
        let keys = keys(b"secret");
        let mut session = Session::anonymous(keys.clone());
        session.login("alice").unwrap();
        let (mut next, _) = round_trip(session, keys.clone());

        next.logout().unwrap();
        let (after, set_cookie) = round_trip(next, keys);
        let set_cookie = set_cookie.unwrap();
        assert!(set_cookie.starts_with("quill_session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
        assert_eq!(after.identity(), None);
    }

    #[test]
    fn anonymous_session_sets_no_cookie() {
        let keys = keys(b"secret");
        let (_, set_cookie) = round_trip(Session::anonymous(keys.clone()), keys);
        assert!(set_cookie.is_none());
    }
}
