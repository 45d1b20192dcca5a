use crate::db::ProfileStore;
use crate::domain::models::PublicProfile;
use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use rand_core::OsRng;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("user not found")]
    NotFound,
    #[error("no password set for this account")]
    NoPasswordSet,
    #[error("incorrect password")]
    BadPassword,
    #[error("profile lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Looks up the profile by email and checks the password against the stored
/// hash. The profile's role is not part of the check; callers that expect a
/// particular role compare it themselves.
pub async fn login_user(
    store: &dyn ProfileStore,
    email: &str,
    password: &str,
) -> Result<PublicProfile, LoginError> {
    let profile = store
        .find_profile_by_email(email)
        .await
        .map_err(LoginError::Lookup)?
        .ok_or(LoginError::NotFound)?;

    let Some(stored) = profile.hashed_password.as_deref().filter(|h| !h.is_empty()) else {
        return Err(LoginError::NoPasswordSet);
    };

    // an unparseable stored hash can never match
    let parsed = PasswordHash::new(stored).map_err(|_| LoginError::BadPassword)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| LoginError::BadPassword)?;

    Ok(profile.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryProfileStore;
    use crate::domain::models::{NewProfile, UserRole};

    async fn store_with(email: &str, hash: String) -> MemoryProfileStore {
        let store = MemoryProfileStore::default();
        store
            .create_profile(NewProfile {
                first_name: "Juan".into(),
                last_name: "Pérez".into(),
                email: email.into(),
                hashed_password: hash,
                user_type: UserRole::Patient,
                phone: None,
                date_of_birth: None,
                gender: None,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_login_success_strips_hash() {
        let store = store_with("juan@example.com", hash_password("Paciente123!").unwrap()).await;
        let profile = login_user(&store, "juan@example.com", "Paciente123!").await.unwrap();
        assert_eq!(profile.email, "juan@example.com");
        assert_eq!(profile.user_type, UserRole::Patient);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
    }

    #[tokio::test]
    async fn test_wrong_password_is_distinct_from_missing_user() {
        let store = store_with("juan@example.com", hash_password("Paciente123!").unwrap()).await;
        let wrong = login_user(&store, "juan@example.com", "nope").await;
        assert!(matches!(wrong, Err(LoginError::BadPassword)));
        let missing = login_user(&store, "nadie@example.com", "Paciente123!").await;
        assert!(matches!(missing, Err(LoginError::NotFound)));
    }

    #[tokio::test]
    async fn test_empty_hash_means_no_password() {
        let store = store_with("legacy@example.com", String::new()).await;
        let result = login_user(&store, "legacy@example.com", "anything").await;
        assert!(matches!(result, Err(LoginError::NoPasswordSet)));
    }
}
