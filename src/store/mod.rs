pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemStore;
pub use models::{Article, ArticleChanges, NewArticle, NewUser, Session, User};
pub use postgres::PgStore;

/// Data-store failure. Absence of a row is never an error: lookups return
/// `Ok(None)` so callers can distinguish "not found" from real I/O trouble.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

/// The seam between the dispatch core and persistence.
///
/// The dispatcher only ever needs `find_session_valid` / `find_user_by_id`;
/// the remaining methods back the business handlers. Implementations enforce
/// cross-request consistency (unique email, unique slug) themselves.
#[async_trait]
pub trait Store: Send + Sync {
    /// True iff the session exists, is not soft-deleted, and belongs to `user_id`.
    async fn find_session_valid(&self, session_id: Uuid, user_id: Uuid)
        -> Result<bool, StoreError>;

    /// Live (non-soft-deleted) user by id.
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Duplicate email yields `StoreError::Conflict`.
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn create_session(&self, user_id: Uuid) -> Result<Session, StoreError>;

    /// Soft-deletes the session; deleting an already-dead session is a no-op.
    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError>;

    /// Derives the slug from the title; on collision tries suffixed variants
    /// `-2`..`-10` deterministically before giving up with Conflict.
    async fn create_article(&self, new: NewArticle) -> Result<Article, StoreError>;

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError>;

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError>;

    /// Published articles plus, when `viewer` is set, that user's drafts.
    async fn list_articles(&self, viewer: Option<Uuid>) -> Result<Vec<Article>, StoreError>;

    /// Applies the given changes; the slug stays stable across updates.
    async fn update_article(&self, id: Uuid, changes: ArticleChanges)
        -> Result<Article, StoreError>;

    async fn delete_article(&self, id: Uuid) -> Result<(), StoreError>;

    /// Cheap liveness probe for /health.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Lowercase alphanumeric runs joined by single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Collision candidates in the order the store must try them.
pub(crate) fn slug_candidates(base: &str) -> Vec<String> {
    let mut candidates = vec![base.to_string()];
    for n in 2..=10 {
        candidates.push(format!("{}-{}", base, n));
    }
    candidates
}
