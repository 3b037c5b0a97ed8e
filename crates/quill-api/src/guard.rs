use thiserror::Error;
use tracing::warn;

use crate::session::Session;

/// The acting session does not own the requested resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unauthorized")]
pub struct Unauthorized;

/// Allow iff there is a session identity and it is exactly `owner`.
pub fn authorize(identity: Option<&str>, owner: &str) -> Result<(), Unauthorized> {
    match identity {
        Some(current) if current == owner => Ok(()),
        _ => Err(Unauthorized),
    }
}

/// [`authorize`] against the request's session, logging denials.
pub fn require_owner(session: &Session, owner: &str) -> Result<(), Unauthorized> {
    authorize(session.identity(), owner).inspect_err(|_| {
        warn!(
            "Denied access to resource of {} for {}",
            owner,
            session.identity().unwrap_or("<anonymous>")
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_allowed() {
        assert_eq!(authorize(Some("alice"), "alice"), Ok(()));
    }

    #[test]
    fn other_user_is_denied() {
        assert_eq!(authorize(Some("bob"), "alice"), Err(Unauthorized));
    }

    #[test]
    fn anonymous_is_denied() {
        assert_eq!(authorize(None, "alice"), Err(Unauthorized));
    }

    #[test]
    fn comparison_is_exact() {
        assert_eq!(authorize(Some("Alice"), "alice"), Err(Unauthorized));
        assert_eq!(authorize(Some("alice "), "alice"), Err(Unauthorized));
        assert_eq!(authorize(Some(""), ""), Ok(()));
    }
}
