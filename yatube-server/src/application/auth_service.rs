use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::{error::AppError, user::User};
use crate::infrastructure::security::{SessionKeys, hash_password, verify_password};

#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: SessionKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, keys: SessionKeys) -> Self {
        Self { users, keys }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    /// Creates the account and logs the new user straight in: the returned
    /// token goes into the session cookie.
    #[instrument(skip(self, signup))]
    pub async fn signup(&self, signup: Signup) -> Result<(User, String), AppError> {
        let hash = hash_password(&signup.password)
            .map_err(|err| AppError::Internal(err.to_string()))?;
        let user = User::new(
            signup.username,
            signup.email.to_lowercase(),
            hash,
            signup.first_name,
            signup.last_name,
        );
        let user = self.users.create(user).await?;
        let token = self
            .keys
            .issue_session(&user)
            .map_err(|err| AppError::Internal(err.to_string()))?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok((user, token))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String), AppError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::Invalid("invalid username or password".into()))?;

        let valid = verify_password(password, &user.password_hash)
            .map_err(|_| AppError::Invalid("invalid username or password".to_string()))?;
        if !valid {
            return Err(AppError::Invalid("invalid username or password".into()));
        }

        let token = self
            .keys
            .issue_session(&user)
            .map_err(|err| AppError::Internal(err.to_string()))?;

        info!(username = %user.username, "user logged in");
        Ok((user, token))
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.get_user(user_id).await?;
        let valid = verify_password(old_password, &user.password_hash)
            .map_err(|_| AppError::Invalid("your old password was entered incorrectly".into()))?;
        if !valid {
            return Err(AppError::Invalid(
                "your old password was entered incorrectly".into(),
            ));
        }

        let hash =
            hash_password(new_password).map_err(|err| AppError::Internal(err.to_string()))?;
        self.users.update_password(user_id, hash).await
    }

    /// Issues a reset token for the account behind the email, if any. The
    /// token is only emitted to the log; there is no mail collaborator.
    /// Always reports success so the form does not leak which emails exist.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        if let Some(user) = self.users.find_by_email(&email.to_lowercase()).await? {
            let token = self
                .keys
                .issue_reset_token(user.id)
                .map_err(|err| AppError::Internal(err.to_string()))?;
            info!(username = %user.username, token = %token, "password reset token issued");
        }
        Ok(())
    }

    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let user_id = self
            .keys
            .verify_reset_token(token)
            .map_err(|_| AppError::Invalid("the reset link is invalid or has expired".into()))?;
        let hash =
            hash_password(new_password).map_err(|err| AppError::Internal(err.to_string()))?;
        self.users.update_password(user_id, hash).await
    }
}
