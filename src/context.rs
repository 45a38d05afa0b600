/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::{AuditLog, CommentManager, StatsManager},
    blob_store::ImageStore,
    config::ServerConfig,
    content::{ArticleManager, TaxonomyManager},
    db,
    db::account::User,
    error::AppResult,
    identity::{IdentityResolver, SessionTokens},
    mailer::Mailer,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub article_manager: Arc<ArticleManager>,
    pub taxonomy_manager: Arc<TaxonomyManager>,
    pub comment_manager: Arc<CommentManager>,
    pub stats_manager: Arc<StatsManager>,
    pub audit_log: Arc<AuditLog>,
    pub image_store: Arc<ImageStore>,
    pub identity_resolver: Arc<IdentityResolver>,
    // Email mailer
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;

        // Run migrations
        db::run_migrations(&db).await?;

        // Test connection
        db::test_connection(&db).await?;

        let mailer = Mailer::new(config.email.clone())?;

        tracing::info!("Database ready at {}", config.storage.database.display());
        if !mailer.is_configured() {
            tracing::warn!("Email not configured, password reset links will not be delivered");
        }

        Ok(Self::from_parts(config, db, mailer))
    }

    /// Wire the managers around an already migrated pool
    pub fn from_parts(config: ServerConfig, db: SqlitePool, mailer: Mailer) -> Self {
        let account_manager = Arc::new(AccountManager::new(db.clone()));
        let tokens = SessionTokens::from_config(&config.session);
        let identity_resolver = Arc::new(IdentityResolver::new(tokens, account_manager.clone()));

        Self {
            account_manager,
            article_manager: Arc::new(ArticleManager::new(db.clone(), config.content.page_size)),
            taxonomy_manager: Arc::new(TaxonomyManager::new(db.clone())),
            comment_manager: Arc::new(CommentManager::new(
                db.clone(),
                config.content.comment_min_length,
            )),
            stats_manager: Arc::new(StatsManager::new(db.clone())),
            audit_log: Arc::new(AuditLog::new(db.clone())),
            image_store: Arc::new(ImageStore::new(db.clone(), config.storage.image_upload_limit)),
            identity_resolver,
            mailer: Arc::new(mailer),
            config: Arc::new(config),
            db,
        }
    }

    /// Session cookie carrying a fresh token for the user
    pub fn session_cookie(&self, user: &User) -> AppResult<Cookie<'static>> {
        let tokens = self.identity_resolver.tokens();
        let token = tokens.issue(user.id, user.role, user.session_version)?;

        Ok(Cookie::build((self.config.session.cookie_name.clone(), token))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.config.session.cookie_secure)
            .max_age(time::Duration::seconds(tokens.ttl_seconds()))
            .build())
    }

    /// Cookie that removes the session credential
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((self.config.session.cookie_name.clone(), ""))
            .http_only(true)
            .path("/")
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();
        cookie
    }

    /// Check if the mailer can deliver
    pub fn email_enabled(&self) -> bool {
        self.mailer.is_configured()
    }
}

#[cfg(test)]
impl AppContext {
    /// Context over an in-memory database with the test configuration
    pub async fn for_tests() -> Self {
        Self::from_parts(ServerConfig::for_tests(), db::memory_pool().await, Mailer::disabled())
    }
}
