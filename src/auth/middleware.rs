use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::error::AppError;

/// Identity of the already-authenticated caller. Authentication itself
/// lives upstream; this service only trusts the gateway's `X-User-Id`
/// header and rejects requests that arrive without one.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
}

pub async fn require_user(mut req: Request, next: Next) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let id = header.parse::<Uuid>().map_err(|_| AppError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser { id });
    Ok(next.run(req).await)
}
