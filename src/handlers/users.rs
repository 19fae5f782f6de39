// User registration and account endpoints.

use serde_json::{json, Value};

use crate::config;
use crate::dispatch::context::RequestContext;
use crate::dispatch::render::Reply;
use crate::error::ApiError;
use crate::params::{Field, ParamSchema};
use crate::state::AppState;
use crate::store::{NewUser, User};

use super::current_identity;

pub fn register_params() -> ParamSchema {
    ParamSchema::new(vec![
        Field::form("name").trim().required(),
        Field::form("email").trim().required(),
        Field::form("password").required(),
    ])
}

/// POST /users - register a new account.
pub async fn register(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let name = ctx.params.text("name").to_string();
    let email = ctx.params.text("email").to_string();
    let password = ctx.params.text("password");

    let cost = config::config().security.bcrypt_cost;
    let password_hash = bcrypt::hash(password, cost)?;

    let user = state
        .store
        .create_user(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(Reply::Created(user_json(&user)))
}

/// GET /user - the authenticated account.
pub async fn me(ctx: &mut RequestContext, _state: &AppState) -> Result<Reply, ApiError> {
    let identity = current_identity(ctx)?;
    Ok(Reply::Ok(user_json(&identity.user)))
}

/// GET /admin/users - full account listing, admin only.
pub async fn list(_ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let users = state.store.list_users().await?;
    let users: Vec<Value> = users.iter().map(user_json).collect();
    Ok(Reply::Ok(json!(users)))
}

/// Client-facing user shape; the password hash never leaves the store layer.
fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "is_admin": user.is_admin,
        "created_at": user.created_at,
    })
}
