//! In-memory store used by the integration tests (and handy for local
//! experiments): the same `Store` contract as Postgres, backed by mutex'd maps.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::models::{Article, ArticleChanges, NewArticle, NewUser, Session, User};
use super::{slug_candidates, slugify, Store, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    articles: HashMap<Uuid, Article>,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: flip the admin flag on an existing user.
    pub fn set_admin(&self, user_id: Uuid, is_admin: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.is_admin = is_admin;
        }
    }

    /// Test hook: soft-delete a user without touching their sessions.
    pub fn soft_delete_user(&self, user_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.deleted_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl Store for MemStore {
    async fn find_session_valid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .get(&session_id)
            .map(|s| s.deleted_at.is_none() && s.user_id == user_id)
            .unwrap_or(false))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .users
            .values()
            .any(|u| u.email == new.email && u.deleted_at.is_none())
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                new.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            is_admin: false,
            created_at: Utc::now(),
            deleted_at: None,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn create_session(&self, user_id: Uuid) -> Result<Session, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
            deleted_at: None,
        };
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(session) = inner.sessions.get_mut(&session_id) {
            if session.deleted_at.is_none() {
                session.deleted_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn create_article(&self, new: NewArticle) -> Result<Article, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let base = slugify(&new.title);

        let slug = slug_candidates(&base)
            .into_iter()
            .find(|candidate| !inner.articles.values().any(|a| &a.slug == candidate))
            .ok_or_else(|| {
                StoreError::Conflict(format!("could not allocate a unique slug for '{}'", base))
            })?;

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            slug,
            content: new.content,
            published: new.published,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        inner.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .values()
            .find(|a| a.slug == slug && a.deleted_at.is_none())
            .cloned())
    }

    async fn list_articles(&self, viewer: Option<Uuid>) -> Result<Vec<Article>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut articles: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| a.deleted_at.is_none())
            .filter(|a| a.published || viewer.map(|v| v == a.user_id).unwrap_or(false))
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }

    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> Result<Article, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let article = inner
            .articles
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none())
            .ok_or_else(|| StoreError::Internal(format!("article {} no longer exists", id)))?;

        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(content) = changes.content {
            article.content = content;
        }
        if let Some(published) = changes.published {
            article.published = published;
        }
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(article) = inner.articles.get_mut(&id) {
            if article.deleted_at.is_none() {
                article.deleted_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
