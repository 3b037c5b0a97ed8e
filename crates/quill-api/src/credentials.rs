//! Password credential handling.
//!
//! Passwords are hashed with Argon2id into PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) with a fresh random salt
//! per user. Verification reads the parameters back out of the stored hash,
//! so raising the cost later does not break existing accounts.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use thiserror::Error;

use quill_db::models::NewUser;
use quill_db::{Database, StoreError};
use quill_types::api::RegisterForm;
use quill_types::models::User;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CredentialError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername(username) => CredentialError::DuplicateUsername(username),
            other => CredentialError::Store(other),
        }
    }
}

/// Registers and authenticates users against the store.
pub struct Credentials {
    argon2: Argon2<'static>,
    /// Verified against when the username is unknown, so a miss costs as
    /// much as a wrong password.
    dummy_hash: String,
}

impl Credentials {
    pub fn new(params: Params) -> Result<Self, CredentialError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "quill-dummy-password")?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Argon2id with the crate's default (memory-hard) parameters.
    pub fn with_default_params() -> Result<Self, CredentialError> {
        Self::new(Params::default())
    }

    #[cfg(test)]
    pub(crate) fn cheap() -> Self {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
            .expect("minimum argon2 params are valid");
        Self::new(params).expect("hashing with minimum params")
    }

    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        hash_with(&self.argon2, password)
    }

    /// `Ok(false)` on mismatch; `Err` only if the stored hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| CredentialError::Hash(format!("stored hash is malformed: {e}")))?;
        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Hash the password and persist a new user.
    pub fn register(&self, db: &Database, form: &RegisterForm) -> Result<User, CredentialError> {
        let password_hash = self.hash(&form.password)?;

        let row = db.create_user(&NewUser {
            username: &form.username,
            password_hash: &password_hash,
            email: &form.email,
            first_name: &form.first_name,
            last_name: &form.last_name,
        })?;

        Ok(row.into())
    }

    /// Returns the user if `password` matches. Unknown usernames and wrong
    /// passwords both yield `Ok(None)`.
    pub fn authenticate(
        &self,
        db: &Database,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, CredentialError> {
        let Some(row) = db.find_user(username)? else {
            let _ = self.verify(password, &self.dummy_hash);
            return Ok(None);
        };

        if self.verify(password, &row.password)? {
            Ok(Some(row.into()))
        } else {
            Ok(None)
        }
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, password: &str) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            password: password.into(),
            email: "a@x.com".into(),
            first_name: "A".into(),
            last_name: "L".into(),
        }
    }

    #[test]
    fn stored_password_is_hashed() {
        let db = Database::open_in_memory().unwrap();
        let creds = Credentials::cheap();
        creds.register(&db, &form("alice", "secret1")).unwrap();

        let row = db.find_user("alice").unwrap().unwrap();
        assert_ne!(row.password, "secret1");
        assert!(row.password.starts_with("$argon2id$"));
    }

    #[test]
    fn authenticate_matches_only_the_registered_password() {
        let db = Database::open_in_memory().unwrap();
        let creds = Credentials::cheap();
        let user = creds.register(&db, &form("alice", "secret1")).unwrap();

        assert_eq!(creds.authenticate(&db, "alice", "secret1").unwrap(), Some(user));
        assert_eq!(creds.authenticate(&db, "alice", "secret2").unwrap(), None);
        assert_eq!(creds.authenticate(&db, "alice", "").unwrap(), None);
        assert_eq!(creds.authenticate(&db, "bob", "secret1").unwrap(), None);
    }

    #[test]
    fn duplicate_registration_is_a_domain_error() {
        let db = Database::open_in_memory().unwrap();
        let creds = Credentials::cheap();
        creds.register(&db, &form("alice", "secret1")).unwrap();

        let err = creds.register(&db, &form("alice", "other-pw")).err().unwrap();
        assert!(matches!(err, CredentialError::DuplicateUsername(ref name) if name == "alice"));

        // The first registration's password still works.
        assert!(creds.authenticate(&db, "alice", "secret1").unwrap().is_some());
        assert!(creds.authenticate(&db, "alice", "other-pw").unwrap().is_none());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let creds = Credentials::cheap();
        let a = creds.hash("secret1").unwrap();
        let b = creds.hash("secret1").unwrap();
        assert_ne!(a, b);
        assert!(creds.verify("secret1", &a).unwrap());
        assert!(creds.verify("secret1", &b).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let creds = Credentials::cheap();
        assert!(creds.verify("secret1", "not-a-phc-string").is_err());
    }
}
