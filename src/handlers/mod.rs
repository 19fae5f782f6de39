pub mod articles;
pub mod sessions;
pub mod users;

use crate::auth::Identity;
use crate::dispatch::context::RequestContext;
use crate::error::ApiError;

/// The identity attached by the authenticate phase. Endpoints behind
/// `require_user`/`require_admin` always have one; this keeps handlers
/// total anyway.
pub(crate) fn current_identity(ctx: &RequestContext) -> Result<&Identity, ApiError> {
    ctx.identity
        .as_ref()
        .ok_or_else(|| ApiError::unauthorized("authentication required"))
}
