use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let mut user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    apply_role_override(&mut user, &config);

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn apply_role_override(user: &mut User, config: &AppConfig) {
    let Some(role) = config
        .overrides
        .effective_role_override()
        .and_then(|raw| raw.parse::<Role>().ok())
    else {
        return;
    };

    debug!("Applying development role override {} for user {}", role, user.id);
    user.roles = vec![role];
}
