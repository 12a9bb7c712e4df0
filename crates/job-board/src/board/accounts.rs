use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AdminBootstrap;

use super::auth::{CredentialHasher, Principal, TokenIssuer};
use super::domain::{NewUser, Role, User, UserView};
use super::error::BoardError;
use super::notify::{Mailer, Notification, Notifier};
use super::repository::{RepositoryError, Store};
use super::validation;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserView,
}

/// Registration, login and profile management.
pub struct AccountService<S, N> {
    store: Arc<S>,
    tokens: Arc<TokenIssuer>,
    hasher: CredentialHasher,
    mailer: Arc<Mailer<N>>,
}

impl<S, N> AccountService<S, N>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        tokens: Arc<TokenIssuer>,
        hasher: CredentialHasher,
        mailer: Arc<Mailer<N>>,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            mailer,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, BoardError> {
        let email = validation::email(request.email)?;
        let password = validation::password(request.password)?;
        let first_name = validation::required(request.first_name, "firstName")?;
        let last_name = validation::required(request.last_name, "lastName")?;
        let role = match validation::required(request.role, "role")?.as_str() {
            "user" => Role::User,
            "employer" => Role::Employer,
            _ => return Err(BoardError::validation("Invalid role")),
        };
        let company = match role {
            Role::Employer => Some(
                validation::optional(request.company)
                    .ok_or_else(|| BoardError::validation("Company name is required for employers"))?,
            ),
            _ => validation::optional(request.company),
        };

        if self.store.user_by_email(&email).await?.is_some() {
            return Err(user_exists());
        }

        let password_hash = self.hasher.hash_blocking(password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                email,
                password_hash,
                first_name,
                last_name,
                role,
                company,
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => user_exists(),
                other => other.into(),
            })?;
        info!(user_id = %user.id, role = user.role.label(), "account registered");

        self.mailer.dispatch(
            &user.email,
            Notification::Welcome {
                first_name: user.first_name.clone(),
            },
        );

        self.authenticated("User created successfully", &user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, BoardError> {
        let (email, password) = match (
            validation::optional(request.email),
            request.password.filter(|raw| !raw.is_empty()),
        ) {
            (Some(email), Some(password)) => (email.to_lowercase(), password),
            _ => return Err(BoardError::validation("Email and password are required")),
        };

        let user = self.store.user_by_email(&email).await?;
        let verified = match &user {
            Some(user) => {
                self.hasher
                    .verify_blocking(password, user.password_hash.clone())
                    .await
            }
            None => false,
        };
        let user = user
            .filter(|_| verified)
            .ok_or_else(|| BoardError::unauthenticated("Invalid email or password"))?;

        self.authenticated("Login successful", &user)
    }

    pub async fn profile(&self, principal: &Principal) -> Result<UserView, BoardError> {
        Ok(self.current_user(principal).await?.view())
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        update: ProfileUpdate,
    ) -> Result<UserView, BoardError> {
        let mut user = self.current_user(principal).await?;

        if update.first_name.is_some() {
            user.first_name = validation::required(update.first_name, "firstName")?;
        }
        if update.last_name.is_some() {
            user.last_name = validation::required(update.last_name, "lastName")?;
        }
        if user.role == Role::Employer && update.company.is_some() {
            user.company = Some(validation::required(update.company, "company")?);
        }

        self.store.update_user(user).await?;
        Ok(self.current_user(principal).await?.view())
    }

    /// Creates the configured administrator unless the address is already registered.
    pub async fn ensure_admin(&self, admin: &AdminBootstrap) -> Result<bool, BoardError> {
        let email = validation::email(Some(admin.email.clone()))?;
        if let Some(existing) = self.store.user_by_email(&email).await? {
            if existing.role != Role::Admin {
                warn!(user_id = %existing.id, "admin bootstrap address belongs to a non-admin account");
            }
            return Ok(false);
        }

        let password = validation::password(Some(admin.password.clone()))?;
        let password_hash = self.hasher.hash_blocking(password).await?;
        let user = self.store.insert_user(NewUser {
            email,
            password_hash,
            first_name: admin.first_name.clone(),
            last_name: admin.last_name.clone(),
            role: Role::Admin,
            company: None,
            created_at: Utc::now(),
        })
        .await?;
        info!(user_id = %user.id, "administrator account created");
        Ok(true)
    }

    async fn current_user(&self, principal: &Principal) -> Result<User, BoardError> {
        self.store
            .user_by_id(principal.id)
            .await?
            .ok_or_else(|| BoardError::not_found("User not found"))
    }

    fn authenticated(&self, message: &'static str, user: &User) -> Result<AuthResponse, BoardError> {
        let token = self
            .tokens
            .issue(user.id, user.role)
            .map_err(|err| BoardError::Credential(err.to_string()))?;
        Ok(AuthResponse {
            message,
            token,
            user: user.view(),
        })
    }
}

fn user_exists() -> BoardError {
    BoardError::Conflict("User already exists".to_string())
}
