use std::sync::Arc;

use chrono::Duration;

use crate::config::{AppConfig, AppEnvironment, NotificationConfig};

use super::accounts::AccountService;
use super::admin::AdminService;
use super::applications::ApplicationService;
use super::auth::{CredentialHasher, Principal, TokenError, TokenIssuer};
use super::error::BoardError;
use super::jobs::JobService;
use super::notify::{Mailer, Notifier};
use super::repository::Store;

/// Runtime knobs for the board, usually derived from [`AppConfig`].
#[derive(Clone)]
pub struct BoardSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub hasher: CredentialHasher,
    pub branding: NotificationConfig,
}

impl BoardSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, BoardError> {
        let hasher = match config.environment {
            AppEnvironment::Test => CredentialHasher::with_cost(8, 1, 1)?,
            _ => CredentialHasher::default(),
        };

        Ok(Self {
            jwt_secret: config.auth.jwt_secret.clone(),
            token_ttl: Duration::days(config.auth.token_ttl_days),
            hasher,
            branding: config.notifications.clone(),
        })
    }
}

/// Every board service wired over one store and one notifier.
pub struct JobBoard<S, N> {
    pub accounts: AccountService<S, N>,
    pub jobs: JobService<S>,
    pub applications: ApplicationService<S, N>,
    pub admin: AdminService<S, N>,
    tokens: Arc<TokenIssuer>,
    store: Arc<S>,
}

impl<S, N> JobBoard<S, N>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, settings: BoardSettings) -> Self {
        let tokens = Arc::new(TokenIssuer::new(&settings.jwt_secret, settings.token_ttl));
        let mailer = Arc::new(Mailer::new(notifier, settings.branding));

        Self {
            accounts: AccountService::new(
                store.clone(),
                tokens.clone(),
                settings.hasher,
                mailer.clone(),
            ),
            jobs: JobService::new(store.clone()),
            applications: ApplicationService::new(store.clone(), mailer.clone()),
            admin: AdminService::new(store.clone(), mailer),
            tokens,
            store,
        }
    }

    pub fn authenticate(&self, token: &str) -> Result<Principal, TokenError> {
        self.tokens.verify(token)
    }

    pub async fn health(&self) -> Result<(), BoardError> {
        self.store.ping().await.map_err(BoardError::from)
    }
}
