use std::sync::Arc;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;
use crate::state::AppState;

/// Validates the bearer token and stores the resulting `User` in the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::Auth("Missing or malformed authorization header".to_string()))?;

    let user = authenticate(&state, bearer.token())?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Resolve a raw JWT to the caller, as the middleware does.
pub fn authenticate(state: &AppState, token: &str) -> Result<User, AppError> {
    validate_token(token, &state.config.supabase_jwt_secret).map_err(|e| AppError::Auth(e.to_string()))
}
