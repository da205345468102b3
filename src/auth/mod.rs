pub mod jwt;

use std::collections::HashMap;
use std::sync::RwLock;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

#[derive(Debug)]
pub enum AuthError {
    UsernameTaken,
    MissingFields,
    InvalidCredentials,
    InvalidToken,
    Hash(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::UsernameTaken => write!(f, "Username already taken"),
            AuthError::MissingFields => write!(f, "Username and password are required"),
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::InvalidToken => write!(f, "Could not validate credentials"),
            AuthError::Hash(msg) => write!(f, "password hashing error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// In-memory credential store: username -> Argon2 password hash.
/// Contents are lost on restart; persistence is deliberately out of scope.
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, String>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let mut users = self.users.write().unwrap();
        if users.contains_key(username) {
            return Err(AuthError::UsernameTaken);
        }
        let hash = hash_password(password)?;
        users.insert(username.to_string(), hash);
        Ok(())
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let users = self.users.read().unwrap();
        let Some(hash) = users.get(username) else {
            return Err(AuthError::InvalidCredentials);
        };
        verify_password(password, hash)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.read().unwrap().contains_key(username)
    }
}

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(plain: &str, hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_correct_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).is_ok());
    }

    #[test]
    fn hash_rejects_wrong_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(matches!(
            verify_password("hunter3", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn register_then_verify() {
        let store = UserStore::new();
        store.register("alice", "pw").unwrap();
        assert!(store.verify("alice", "pw").is_ok());
        assert!(store.contains("alice"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let store = UserStore::new();
        store.register("alice", "pw").unwrap();
        assert!(matches!(
            store.register("alice", "other"),
            Err(AuthError::UsernameTaken)
        ));
    }

    #[test]
    fn unknown_user_fails_verification() {
        let store = UserStore::new();
        assert!(matches!(
            store.verify("ghost", "pw"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
