use ammonia::Builder;
use html_escape::encode_double_quoted_attribute;
use regex::Regex;
use spin_sdk::http::{Request, Response};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::config::*;
use crate::core::db::AppContext;
use crate::core::errors::ApiError;
use crate::core::helpers::{is_http_url, json_response, now_iso, parse_body, validate_uuid};
use crate::models::models::{post_json, NewPostRequest, Post, PostPatch, User};

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("Regex should compile"))
}

fn sanitize_title(title: &str) -> String {
    // Titles are plain text.
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(title)
        .to_string()
}

fn filter_content(content: &str) -> String {
    // Sanitize HTML to remove dangerous scripts and event handlers
    let clean = Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(content)
        .to_string();

    // Convert HTTP/HTTPS URLs into clickable links with proper escaping
    url_regex()
        .replace_all(&clean, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}

fn check_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() || title.len() > MAX_TITLE_LENGTH {
        return Err(ApiError::InvalidInput("Invalid title".to_string()));
    }
    Ok(())
}

fn check_content(content: &str) -> Result<(), ApiError> {
    if content.is_empty() || content.len() > MAX_CONTENT_LENGTH {
        return Err(ApiError::InvalidInput("Invalid content".to_string()));
    }
    Ok(())
}

fn check_image(image: &str) -> Result<(), ApiError> {
    if !is_http_url(image) {
        return Err(ApiError::InvalidInput(
            "Image must be an http(s) URL".to_string(),
        ));
    }
    Ok(())
}

/// Post plus its author resolved for display.
fn post_view(ctx: &AppContext, post: &Post) -> anyhow::Result<serde_json::Value> {
    let author = ctx.users.find_by_id(&post.author)?;
    Ok(post_json(post, author.as_ref()))
}

pub fn create_post(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let user_id = match authenticate(req) {
        Ok(uid) => uid,
        Err(e) => return Ok(e.into()),
    };

    let body: NewPostRequest = match parse_body(req) {
        Ok(b) => b,
        Err(e) => return Ok(e.into()),
    };

    let (title, content) = match (
        body.title.as_deref().map(str::trim),
        body.content.as_deref().map(str::trim),
    ) {
        (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => (t, c),
        _ => {
            return Ok(
                ApiError::InvalidInput("Please provide title and content".to_string()).into(),
            )
        }
    };

    // Bounds apply to what gets stored, so sanitize before checking; an
    // HTML-only field collapses to empty and fails here.
    let title = sanitize_title(title);
    let content = filter_content(content);
    if let Err(e) = check_title(&title).and_then(|_| check_content(&content)) {
        return Ok(e.into());
    }

    let image = body.image.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(url) = image {
        if let Err(e) = check_image(url) {
            return Ok(e.into());
        }
    }

    let post = Post {
        id: Uuid::new_v4().to_string(),
        title,
        content,
        image: image.map(str::to_string),
        author: user_id,
        created_at: now_iso(),
        updated_at: None,
    };

    ctx.posts.insert(&post)?;

    Ok(json_response(
        201,
        &serde_json::json!({ "success": true, "post": post_view(ctx, &post)? }),
    ))
}

pub fn get_post(ctx: &AppContext, post_id: &str) -> anyhow::Result<Response> {
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::NotFound("Blog not found".to_string()).into());
    }

    match ctx.posts.find_by_id(post_id)? {
        Some(post) => Ok(json_response(
            200,
            &serde_json::json!({ "success": true, "blog": post_view(ctx, &post)? }),
        )),
        None => Ok(ApiError::NotFound("Blog not found".to_string()).into()),
    }
}

pub fn update_post(ctx: &AppContext, req: &Request, post_id: &str) -> anyhow::Result<Response> {
    let user_id = match authenticate(req) {
        Ok(uid) => uid,
        Err(e) => return Ok(e.into()),
    };

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::NotFound("Blog not found".to_string()).into());
    }

    // Existence check first, ownership second.
    let mut post = match ctx.posts.find_by_id(post_id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Blog not found".to_string()).into()),
    };
    if post.author != user_id {
        return Ok(ApiError::Forbidden.into());
    }

    let patch: PostPatch = match parse_body(req) {
        Ok(b) => b,
        Err(e) => return Ok(e.into()),
    };

    let mut changed = false;

    if let Some(title) = patch.title.as_deref().map(str::trim) {
        let title = sanitize_title(title);
        if let Err(e) = check_title(&title) {
            return Ok(e.into());
        }
        if post.title != title {
            post.title = title;
            changed = true;
        }
    }

    if let Some(content) = patch.content.as_deref().map(str::trim) {
        let content = filter_content(content);
        if let Err(e) = check_content(&content) {
            return Ok(e.into());
        }
        if post.content != content {
            post.content = content;
            changed = true;
        }
    }

    if let Some(image) = patch.image.as_deref().map(str::trim) {
        let image = if image.is_empty() {
            None
        } else {
            if let Err(e) = check_image(image) {
                return Ok(e.into());
            }
            Some(image.to_string())
        };
        if post.image != image {
            post.image = image;
            changed = true;
        }
    }

    // Only fields present in the patch are touched; the author never is.
    if changed {
        post.updated_at = Some(now_iso());
        ctx.posts.save(&post)?;
    }

    Ok(json_response(
        200,
        &serde_json::json!({ "success": true, "post": post_view(ctx, &post)? }),
    ))
}

pub fn delete_post(ctx: &AppContext, req: &Request, post_id: &str) -> anyhow::Result<Response> {
    let user_id = match authenticate(req) {
        Ok(uid) => uid,
        Err(e) => return Ok(e.into()),
    };

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::NotFound("Blog not found".to_string()).into());
    }

    let post = match ctx.posts.find_by_id(post_id)? {
        Some(p) => p,
        None => return Ok(ApiError::NotFound("Blog not found".to_string()).into()),
    };
    if post.author != user_id {
        return Ok(ApiError::Forbidden.into());
    }

    ctx.posts.delete_one(post_id)?;

    Ok(json_response(
        200,
        &serde_json::json!({ "success": true, "message": "Blog deleted successfully" }),
    ))
}

fn list_params(uri: &str) -> (Option<String>, usize) {
    let mut author = None;
    let mut page = 1;

    if let Some((_, query)) = uri.split_once('?') {
        for param in query.split('&') {
            if let Some(value) = param.strip_prefix("author=") {
                let decoded = urlencoding::decode(value)
                    .unwrap_or(std::borrow::Cow::Borrowed(value))
                    .to_string();
                if !decoded.is_empty() {
                    author = Some(decoded);
                }
            } else if let Some(value) = param.strip_prefix("page=") {
                if let Ok(n) = value.parse::<usize>() {
                    page = n.max(1);
                }
            }
        }
    }

    (author, page)
}

/// Public listing, newest-created first. `?author=<username>` filters,
/// `?page=N` paginates.
pub fn list_posts(ctx: &AppContext, req: &Request) -> anyhow::Result<Response> {
    let (author_filter, page) = list_params(req.uri());

    let mut posts = ctx.posts.all()?;

    if let Some(username) = author_filter {
        let author = ctx.users.find_one(&|u: &User| u.username == username)?;
        match author {
            Some(user) => posts.retain(|p| p.author == user.id),
            None => posts.clear(),
        }
    }

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let start = page.saturating_sub(1).saturating_mul(POSTS_PER_PAGE);
    let page_posts: Vec<Post> = posts.into_iter().skip(start).take(POSTS_PER_PAGE).collect();

    let mut blogs = Vec::with_capacity(page_posts.len());
    for post in &page_posts {
        blogs.push(post_view(ctx, post)?);
    }

    Ok(json_response(
        200,
        &serde_json::json!({ "success": true, "count": blogs.len(), "blogs": blogs }),
    ))
}
