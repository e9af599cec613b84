//! Account registration, login and credential verification
//!
//! Session tokens issued by [`login`] are the credential a real-time
//! connection presents when it joins the draft.

use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Principal, Session, User};
use crate::storage::Database;

/// Resolves a presented credential to an identity
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credential: &str) -> Result<Principal>;
}

/// Validate username/password shape shared by register and login
fn validate_credentials(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(Error::InvalidPayload(
            "username and password are required".into(),
        ));
    }
    Ok(())
}

/// Create a new account with an argon2 password hash
#[instrument(skip(db, password))]
pub fn register(db: &Database, username: &str, password: &str) -> Result<User> {
    validate_credentials(username, password)?;
    let username = username.trim();

    if db.users().find_by_username(username)?.is_some() {
        return Err(Error::InvalidPayload(format!(
            "username {} is already taken",
            username
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::InvalidPayload(format!("could not hash password: {}", e)))?
        .to_string();

    let user = User::new(username.to_string(), password_hash);
    db.users().create(&user)?;
    info!(user_id = %user.id, "Registered user");
    Ok(user)
}

/// Verify a password and open a session lasting `session_hours`
#[instrument(skip(db, password))]
pub fn login(db: &Database, username: &str, password: &str, session_hours: i64) -> Result<Session> {
    validate_credentials(username, password)?;

    let user = db
        .users()
        .find_by_username(username.trim())?
        .ok_or_else(|| Error::Unauthorized("invalid credentials".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| Error::Unauthorized("invalid stored password".into()))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!("Password verification failed");
        return Err(Error::Unauthorized("invalid credentials".into()));
    }

    db.users().update_last_login(user.id)?;
    let session = Session::new(user.id, session_hours);
    db.users().create_session(&session)?;
    info!(user_id = %user.id, expires_at = %session.expires_at, "Session opened");
    Ok(session)
}

/// Authenticates session tokens against the sessions table
pub struct SessionAuthenticator {
    db: Arc<Mutex<Database>>,
}

impl SessionAuthenticator {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

impl Authenticator for SessionAuthenticator {
    fn authenticate(&self, credential: &str) -> Result<Principal> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(Error::Unauthorized("no token provided".into()));
        }
        let session_id = Uuid::parse_str(credential)
            .map_err(|_| Error::Unauthorized("invalid token".into()))?;

        let db = self
            .db
            .lock()
            .map_err(|_| Error::TransactionFailure("database lock poisoned".into()))?;
        let session = db
            .users()
            .find_valid_session(session_id)?
            .ok_or_else(|| Error::Unauthorized("invalid or expired token".into()))?;
        let user = db
            .users()
            .find_by_id(session.user_id)?
            .ok_or_else(|| Error::Unauthorized("unknown user".into()))?;

        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }
}
