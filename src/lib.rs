pub mod auth;
pub mod config;
pub mod core;
pub mod models;
pub mod posts;
pub mod users;

use spin_sdk::http::{Request, Response};

use crate::core::db::AppContext;
use crate::core::errors::ApiError;

/// Route table shared by the Spin component and the native binary.
pub fn route(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let method = req.method().to_string();
    let path = req.path().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/register") => users::register_user(ctx, req),
        ("POST", "/login") => auth::login_user(ctx, req),
        ("GET", "/me") => users::get_me(ctx, req),
        ("GET", "/blog") => posts::list_posts(ctx, req),
        ("POST", "/blog") => posts::create_post(ctx, req),
        ("GET", p) if p.starts_with("/blog/") => {
            posts::get_post(ctx, p.trim_start_matches("/blog/"))
        }
        ("PUT", p) if p.starts_with("/blog/") => {
            posts::update_post(ctx, req, p.trim_start_matches("/blog/"))
        }
        ("DELETE", p) if p.starts_with("/blog/") => {
            posts::delete_post(ctx, req, p.trim_start_matches("/blog/"))
        }
        _ => Ok(ApiError::NotFound("No route found".to_string()).into()),
    }
}

#[cfg(target_arch = "wasm32")]
mod component {
    use spin_sdk::http::{IntoResponse, Request};
    use spin_sdk::http_component;

    use crate::core::db::AppContext;
    use crate::core::errors::ApiError;

    #[http_component]
    fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
        let result = AppContext::kv().and_then(|ctx| crate::route(&ctx, &req));
        match result {
            Ok(resp) => Ok(resp),
            // Collaborator failures surface as a generic 500.
            Err(err) => Ok(ApiError::from(err).into()),
        }
    }
}
