use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::error::ServerError;

/// The authenticated caller behind a request, inserted into the request's
/// extensions by upstream middleware this crate does not implement (see
/// the Open Question resolution on the magic-link cooldown). Handlers pull
/// it out with `axum::Extension<CallerIdentity>`.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity {
    pub user_id: Uuid,
}

impl CallerIdentity {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

/// Stands in for the magic-link auth collaborator: reads the caller's user
/// id from an `X-User-Id` header and inserts it as a [`CallerIdentity`]
/// extension. A real deployment replaces this layer with its own
/// session/token middleware; every handler downstream only ever sees the
/// extension, never this header.
pub async fn require_identity(mut request: Request, next: Next) -> Result<Response, ServerError> {
    let user_id = request
        .headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uuid>().ok())
        .ok_or_else(|| ServerError::Unauthorized("missing or invalid X-User-Id header".into()))?;

    request.extensions_mut().insert(CallerIdentity::new(user_id));
    Ok(next.run(request).await)
}
