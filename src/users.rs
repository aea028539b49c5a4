use ammonia::Builder;
use chrono::Utc;
use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::auth::{authenticate, issue_token};
use crate::config::*;
use crate::core::db::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, is_valid_email, json_response, now_iso, parse_body};
use crate::models::models::{user_json, RegisterRequest, User};

fn sanitize_text(text: &str) -> String {
    // Plain text only, no HTML survives.
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

pub fn register_user(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let body: RegisterRequest = match parse_body(req) {
        Ok(b) => b,
        Err(e) => return Ok(e.into()),
    };

    let (username, email, password) = match (
        body.username.as_deref().map(str::trim),
        body.email.as_deref().map(str::trim),
        body.password.as_deref(),
    ) {
        (Some(u), Some(e), Some(p)) if !u.is_empty() && !e.is_empty() && !p.is_empty() => {
            (u, e, p)
        }
        _ => {
            return Ok(ApiError::InvalidInput(
                "Please provide all required fields".to_string(),
            )
            .into())
        }
    };

    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Ok(ApiError::InvalidInput("Username must be 3-50 characters".to_string()).into());
    }
    if !is_valid_email(email) {
        return Ok(ApiError::InvalidInput("Please provide a valid email".to_string()).into());
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Ok(
            ApiError::InvalidInput("Password must be at least 8 characters".to_string()).into(),
        );
    }

    // Sanitize username at input time
    let username = sanitize_text(username);

    let taken = ctx
        .users
        .find_one(&|u: &User| u.email == email || u.username == username)?;
    if taken.is_some() {
        return Ok(ApiError::Conflict("User already exists".to_string()).into());
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        email: email.to_string(),
        password: hash_password(password)?,
        created_at: now_iso(),
    };

    ctx.users.insert(&user)?;

    let token = issue_token(&user.id, Utc::now())?;

    Ok(json_response(
        201,
        &serde_json::json!({
            "success": true,
            "token": token,
            "user": user_json(&user),
        }),
    ))
}

pub fn get_me(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let user_id = match authenticate(req) {
        Ok(uid) => uid,
        Err(e) => return Ok(e.into()),
    };

    // A valid signature is not enough here: the subject must still exist.
    match ctx.users.find_by_id(&user_id)? {
        Some(user) => Ok(json_response(
            200,
            &serde_json::json!({ "success": true, "user": user_json(&user) }),
        )),
        None => Ok(ApiError::Unauthorized("Invalid or expired token".to_string()).into()),
    }
}
