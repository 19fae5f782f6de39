use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::models::{Article, ArticleChanges, NewArticle, NewUser, Session, User};
use super::{slug_candidates, slugify, Store, StoreError};

/// Postgres-backed store. All soft deletes are `deleted_at` timestamps;
/// every read filters them out.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for PgStore {
    async fn find_session_valid(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let valid: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL)",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(valid)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_admin, created_at)
            VALUES ($1, $2, $3, $4, false, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                new.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE deleted_at IS NULL ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn create_session(&self, user_id: Uuid) -> Result<Session, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, created_at)
            VALUES ($1, $2, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_article(&self, new: NewArticle) -> Result<Article, StoreError> {
        let base = slugify(&new.title);

        // The unique index on slug is the arbiter under concurrency; we just
        // walk the candidate list until an insert lands.
        for slug in slug_candidates(&base) {
            let result = sqlx::query_as::<_, Article>(
                r#"
                INSERT INTO articles (id, user_id, title, slug, content, published, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, now(), now())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(&new.title)
            .bind(&slug)
            .bind(&new.content)
            .bind(new.published)
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(article) => return Ok(article),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict(format!(
            "could not allocate a unique slug for '{}'",
            base
        )))
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, StoreError> {
        let article = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    async fn find_article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        let article = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE slug = $1 AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    async fn list_articles(&self, viewer: Option<Uuid>) -> Result<Vec<Article>, StoreError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT * FROM articles
            WHERE deleted_at IS NULL
              AND (published OR ($1::uuid IS NOT NULL AND user_id = $1))
            ORDER BY created_at DESC
            "#,
        )
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    async fn update_article(
        &self,
        id: Uuid,
        changes: ArticleChanges,
    ) -> Result<Article, StoreError> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                published = COALESCE($4, published),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.published)
        .fetch_optional(&self.pool)
        .await?;

        article.ok_or_else(|| StoreError::Internal(format!("article {} no longer exists", id)))
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE articles SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
