use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use spin_sdk::http::{Request, Response};

use crate::config;
use crate::core::db::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{dummy_verify, json_response, parse_body, verify_password};
use crate::models::models::{user_json, Claims, LoginRequest, User};

/// Sign a token for a user id. Pure in (input, server secret, clock); no
/// server-side state is written.
pub fn issue_token(user_id: &str, issued_at: DateTime<Utc>) -> anyhow::Result<String> {
    let expiry = issued_at
        .checked_add_signed(Duration::days(config::token_ttl_days()))
        .ok_or_else(|| anyhow::anyhow!("Token expiry out of range"))?;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: issued_at.timestamp() as usize,
        exp: expiry.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config::jwt_secret().as_ref()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))
}

/// Signature and expiry check. Malformed, tampered and expired tokens all
/// collapse into the same None.
pub fn verify_token(token: &str) -> Option<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config::jwt_secret().as_ref()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims.sub)
}

/// Bearer-token gate for protected routes. Returns the caller's user id or
/// the 401 to short-circuit with.
pub fn authenticate(req: &Request) -> Result<String, ApiError> {
    let header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("Authentication required".to_string())),
    };

    verify_token(token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))
}

pub fn login_user(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let body: LoginRequest = match parse_body(req) {
        Ok(b) => b,
        Err(e) => return Ok(e.into()),
    };

    let (email, password) = match (body.email.as_deref(), body.password.as_deref()) {
        (Some(e), Some(p)) if !e.trim().is_empty() && !p.is_empty() => (e.trim().to_string(), p),
        _ => {
            return Ok(
                ApiError::InvalidInput("Please provide email and password".to_string()).into(),
            )
        }
    };

    let user = match ctx.users.find_one(&|u: &User| u.email == email)? {
        Some(u) => u,
        None => {
            // Unknown email still pays for one verification; the response is
            // byte-identical to the wrong-password case.
            dummy_verify(password);
            return Ok(ApiError::Unauthorized("Invalid credentials".to_string()).into());
        }
    };

    if !verify_password(password, &user.password) {
        return Ok(ApiError::Unauthorized("Invalid credentials".to_string()).into());
    }

    let token = issue_token(&user.id, Utc::now())?;

    Ok(json_response(
        200,
        &serde_json::json!({
            "success": true,
            "token": token,
            "user": user_json(&user),
        }),
    ))
}
