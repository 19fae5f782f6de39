//! Session-token authentication: resolve request credentials to an identity,
//! plus the authorization predicates endpoints declare.

use uuid::Uuid;

use crate::dispatch::context::RequestContext;
use crate::error::ApiError;
use crate::store::{Store, User};

/// Resolved authenticated identity: the live user plus the session that
/// vouched for them (kept so logout can revoke exactly that session).
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub session_id: Uuid,
}

/// Resolve the credential headers to an identity, or establish the request
/// as anonymous.
///
/// Both headers absent (or empty) means anonymous, which is not an error.
/// Anything short of a fully valid token/user pair is rejected with 400
/// before the handler ever runs: half-supplied headers, unparseable ids,
/// unknown or revoked sessions, token/user mismatches, and sessions whose
/// owning user has since been deleted.
pub async fn resolve(
    store: &dyn Store,
    session_token: Option<&str>,
    user_id: Option<&str>,
) -> Result<Option<Identity>, ApiError> {
    let (token, user_id) = match (session_token, user_id) {
        (None, None) => return Ok(None),
        (Some(token), Some(user_id)) => (token, user_id),
        _ => return Err(ApiError::bad_request("invalid auth data")),
    };

    let session_id =
        Uuid::parse_str(token).map_err(|_| ApiError::bad_request("invalid auth data"))?;
    let user_id =
        Uuid::parse_str(user_id).map_err(|_| ApiError::bad_request("invalid auth data"))?;

    if !store.find_session_valid(session_id, user_id).await? {
        return Err(ApiError::bad_request("invalid auth data"));
    }

    // A valid session may still point at a user deleted after the session
    // was issued; that also invalidates the credentials.
    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("user not found"))?;

    Ok(Some(Identity {
        user,
        session_id,
    }))
}

/// Authorization predicate: a pure check over the request context, evaluated
/// after authentication and before the handler.
pub type AuthPredicate = fn(&RequestContext) -> Result<(), ApiError>;

/// Any authenticated identity.
pub fn require_user(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.identity.is_some() {
        Ok(())
    } else {
        Err(ApiError::unauthorized("authentication required"))
    }
}

/// Authenticated identity with the admin flag.
pub fn require_admin(ctx: &RequestContext) -> Result<(), ApiError> {
    match &ctx.identity {
        None => Err(ApiError::unauthorized("authentication required")),
        Some(identity) if identity.user.is_admin => Ok(()),
        Some(_) => Err(ApiError::forbidden("admin access required")),
    }
}
