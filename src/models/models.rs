use serde::{Serialize, Deserialize};

use crate::core::db::Record;

#[derive(Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 digest, never the raw secret.
    pub password: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    /// Owning user id; set at creation and never reassigned.
    pub author: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Post {
    const KIND: &'static str = "post";

    fn id(&self) -> &str {
        &self.id
    }
}

/// JWT claim set: subject user id, issued-at and expiry as unix seconds.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

// Request bodies. Required fields are Options so that absence surfaces as a
// 400 with a usable message instead of a deserialization failure.

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default, alias = "name")]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct NewPostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Deserialize)]
pub struct PostPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Non-secret view of a user; the digest never leaves the store.
pub fn user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
    })
}

/// Post with its author resolved to display fields. Posts store only the
/// author id; names are looked up, never duplicated onto the record.
pub fn post_json(post: &Post, author: Option<&User>) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "title": post.title,
        "content": post.content,
        "image": post.image,
        "author": match author {
            Some(u) => user_json(u),
            None => serde_json::json!({ "id": post.author }),
        },
        "created_at": post.created_at,
        "updated_at": post.updated_at,
    })
}
