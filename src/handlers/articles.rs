// Article endpoints. Item routes are keyed by slug; ownership decides
// whether a mutation is allowed (403) while unpublished articles are masked
// as absent (404) so their existence never leaks to other readers.

use serde_json::{json, Value};

use crate::dispatch::context::RequestContext;
use crate::dispatch::render::Reply;
use crate::error::ApiError;
use crate::params::{Field, ParamSchema};
use crate::state::AppState;
use crate::store::{Article, ArticleChanges, NewArticle};

use super::current_identity;

pub fn get_params() -> ParamSchema {
    ParamSchema::new(vec![Field::url("slug").required()])
}

pub fn create_params() -> ParamSchema {
    ParamSchema::new(vec![
        Field::form("title").trim().required(),
        Field::form("content"),
        Field::form("published").boolean(),
    ])
}

pub fn update_params() -> ParamSchema {
    ParamSchema::new(vec![
        Field::url("slug").required(),
        Field::form("title").trim(),
        Field::form("content"),
        Field::form("published").boolean(),
    ])
}

pub fn delete_params() -> ParamSchema {
    ParamSchema::new(vec![Field::url("slug").required()])
}

/// GET /articles - published articles, plus the viewer's own drafts.
pub async fn list(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let viewer = ctx.identity.as_ref().map(|i| i.user.id);
    let articles = state.store.list_articles(viewer).await?;
    let articles: Vec<Value> = articles.iter().map(article_json).collect();
    Ok(Reply::Ok(json!(articles)))
}

/// GET /articles/:slug - one article; drafts are visible only to their
/// author or an admin, everyone else sees 404.
pub async fn get(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let slug = ctx.params.text("slug");
    let article = state
        .store
        .find_article_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found("article not found"))?;

    if !article.published && !can_touch(ctx, &article) {
        // Masked, not forbidden: private articles do not exist for outsiders.
        return Err(ApiError::not_found("article not found"));
    }

    Ok(Reply::Ok(article_json(&article)))
}

/// POST /articles - create; the store derives the slug and resolves
/// collisions deterministically.
pub async fn create(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let author = current_identity(ctx)?.user.id;

    let article = state
        .store
        .create_article(NewArticle {
            user_id: author,
            title: ctx.params.text("title").to_string(),
            content: ctx.params.text("content").to_string(),
            published: ctx.params.flag("published").unwrap_or(false),
        })
        .await?;

    tracing::info!(article_id = %article.id, slug = %article.slug, "article created");
    Ok(Reply::Created(article_json(&article)))
}

/// PUT /articles/:slug - update own article (admins may update any).
pub async fn update(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let article = find_owned(ctx, state).await?;

    let changes = ArticleChanges {
        title: ctx.params.opt_text("title").map(str::to_string),
        content: ctx.params.opt_text("content").map(str::to_string),
        published: ctx.params.flag("published"),
    };

    let article = state.store.update_article(article.id, changes).await?;
    Ok(Reply::Ok(article_json(&article)))
}

/// DELETE /articles/:slug - soft-delete own article (admins may delete any).
pub async fn delete(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let article = find_owned(ctx, state).await?;
    state.store.delete_article(article.id).await?;
    tracing::info!(article_id = %article.id, "article deleted");
    Ok(Reply::NoContent)
}

/// Fetch the item route's article and enforce ownership: missing is 404,
/// someone else's is 403. Both are handler decisions, never server errors.
async fn find_owned(ctx: &RequestContext, state: &AppState) -> Result<Article, ApiError> {
    let slug = ctx.params.text("slug");
    let article = state
        .store
        .find_article_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found("article not found"))?;

    if !can_touch(ctx, &article) {
        return Err(ApiError::forbidden("you do not own this article"));
    }
    Ok(article)
}

fn can_touch(ctx: &RequestContext, article: &Article) -> bool {
    match &ctx.identity {
        Some(identity) => identity.user.is_admin || identity.user.id == article.user_id,
        None => false,
    }
}

fn article_json(article: &Article) -> Value {
    json!({
        "id": article.id,
        "user_id": article.user_id,
        "title": article.title,
        "slug": article.slug,
        "content": article.content,
        "published": article.published,
        "created_at": article.created_at,
        "updated_at": article.updated_at,
    })
}
