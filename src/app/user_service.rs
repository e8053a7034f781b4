//! Registration, login, and account lookups.

use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{info, instrument, warn};

use crate::domain::{
    AppError, DatabaseError, LoginInput, NewUser, RegisterUserInput, User, UserId, UserRepository,
    normalize_email,
};

/// Hash checked when the email matches no account, so both login failures
/// cost one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

/// Application service for user accounts.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    #[must_use]
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        LazyLock::force(&DUMMY_HASH);
        Self { repository }
    }

    /// Registers a new account. Only an Argon2 hash of the password is kept.
    ///
    /// # Errors
    ///
    /// `AppError::DuplicateEmail` when the email is already registered.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: &RegisterUserInput) -> Result<User, AppError> {
        let email = normalize_email(&input.email);
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let user = NewUser {
            name: input.name.trim().to_string(),
            occupation: input.occupation.trim().to_string(),
            email,
            password_hash: hash_password(&input.password)?,
        };

        // A concurrent registration can still win the race; the unique index
        // reports it as a duplicate.
        let created = self.repository.save(&user).await.map_err(|e| match e {
            AppError::Database(DatabaseError::Duplicate(_)) => AppError::DuplicateEmail,
            other => other,
        })?;

        metrics::counter!("users_registered_total").increment(1);
        info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Checks an email/password pair.
    ///
    /// # Errors
    ///
    /// `AppError::InvalidCredentials` for an unknown email and for a wrong
    /// password alike, so callers cannot tell which accounts exist.
    /// Both paths run one password verification.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn authenticate(&self, input: &LoginInput) -> Result<User, AppError> {
        let email = normalize_email(&input.email);
        let Some(user) = self.repository.find_by_email(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(&input.password, dummy);
            }
            metrics::counter!("auth_failures_total").increment(1);
            warn!("Login failed: unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&input.password, &user.password_hash) {
            metrics::counter!("auth_failures_total").increment(1);
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = user.id, "User authenticated");
        Ok(user)
    }

    /// True when no account uses `email`.
    #[instrument(skip(self))]
    pub async fn is_email_available(&self, email: &str) -> Result<bool, AppError> {
        let email = normalize_email(email);
        Ok(self.repository.find_by_email(&email).await?.is_none())
    }

    /// Loads an account by id.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` when no account has this id.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<User, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id}")))
    }

    /// Points the account's avatar at a stored file.
    #[instrument(skip(self))]
    pub async fn attach_avatar(&self, id: UserId, file_name: &str) -> Result<User, AppError> {
        let mut user = self.get_by_id(id).await?;
        user.avatar_file_name = Some(file_name.to_string());
        let updated = self.repository.update(&user).await?;
        info!(user_id = id, "Avatar attached");
        Ok(updated)
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockDatabase;

    fn register_input(email: &str) -> RegisterUserInput {
        RegisterUserInput {
            name: " Ann ".to_string(),
            occupation: "Baker".to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    fn setup() -> (Arc<MockDatabase>, UserService) {
        let db = Arc::new(MockDatabase::new());
        let service = UserService::new(db.clone());
        (db, service)
    }

    #[tokio::test]
    async fn test_register_stores_hash_not_plaintext() {
        let (_db, service) = setup();
        let user = service
            .register(&register_input("Ann@Example.com"))
            .await
            .unwrap();

        assert_eq!(user.name, "Ann");
        assert_eq!(user.email, "ann@example.com");
        assert_ne!(user.password_hash, "correct horse");
        assert!(user.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (_db, service) = setup();
        service
            .register(&register_input("ann@example.com"))
            .await
            .unwrap();

        let result = service.register(&register_input("ANN@example.com")).await;
        assert!(matches!(result, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (_db, service) = setup();
        let registered = service
            .register(&register_input("ann@example.com"))
            .await
            .unwrap();

        let user = service
            .authenticate(&LoginInput {
                email: "ann@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn test_authenticate_does_not_reveal_which_part_failed() {
        let (_db, service) = setup();
        service
            .register(&register_input("ann@example.com"))
            .await
            .unwrap();

        let wrong_password = service
            .authenticate(&LoginInput {
                email: "ann@example.com".to_string(),
                password: "battery staple".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = service
            .authenticate(&LoginInput {
                email: "nobody@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[test]
    fn test_unknown_email_hash_costs_as_much_as_a_real_one() {
        let dummy = DUMMY_HASH.as_deref().expect("dummy hash was not computed");
        let real = hash_password("correct horse").unwrap();

        let dummy = PasswordHash::new(dummy).unwrap();
        let real = PasswordHash::new(&real).unwrap();
        assert_eq!(dummy.algorithm.as_str(), real.algorithm.as_str());
        assert_eq!(dummy.params.to_string(), real.params.to_string());
        assert!(
            Argon2::default()
                .verify_password(b"correct horse", &dummy)
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_is_email_available() {
        let (_db, service) = setup();
        assert!(service.is_email_available("ann@example.com").await.unwrap());

        service
            .register(&register_input("ann@example.com"))
            .await
            .unwrap();
        assert!(!service.is_email_available(" ANN@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let (_db, service) = setup();
        assert!(matches!(
            service.get_by_id(5).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_avatar() {
        let (_db, service) = setup();
        let user = service
            .register(&register_input("ann@example.com"))
            .await
            .unwrap();

        let updated = service
            .attach_avatar(user.id, "images/1-avatar.png")
            .await
            .unwrap();
        assert_eq!(
            updated.avatar_file_name.as_deref(),
            Some("images/1-avatar.png")
        );
        assert_eq!(
            service.get_by_id(user.id).await.unwrap().avatar_file_name,
            updated.avatar_file_name
        );
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
