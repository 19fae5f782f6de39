// Session (login/logout) endpoints. Sessions are immutable rows; logout is
// a soft delete, never an update.

use serde_json::json;

use crate::dispatch::context::RequestContext;
use crate::dispatch::render::Reply;
use crate::error::ApiError;
use crate::params::{Field, ParamSchema};
use crate::state::AppState;

use super::current_identity;

pub fn login_params() -> ParamSchema {
    ParamSchema::new(vec![
        Field::form("email").trim().required(),
        Field::form("password").required(),
    ])
}

/// POST /sessions - exchange credentials for a session token.
pub async fn login(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let email = ctx.params.text("email");
    let password = ctx.params.text("password");

    // Same response for unknown email and wrong password: no account probing.
    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    if !bcrypt::verify(password, &user.password_hash)? {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let session = state.store.create_session(user.id).await?;
    tracing::info!(user_id = %user.id, "session created");

    Ok(Reply::Created(json!({
        "token": session.id,
        "user_id": user.id,
        "created_at": session.created_at,
    })))
}

/// DELETE /sessions - revoke the session that authenticated this request.
pub async fn logout(ctx: &mut RequestContext, state: &AppState) -> Result<Reply, ApiError> {
    let session_id = current_identity(ctx)?.session_id;
    state.store.delete_session(session_id).await?;
    tracing::info!(session_id = %session_id, "session revoked");
    Ok(Reply::NoContent)
}
