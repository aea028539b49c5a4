pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_CONTENT_LENGTH: usize = 20_000;
pub const POSTS_PER_PAGE: usize = 10;

pub fn jwt_secret() -> String {
    std::env::var("QUILL_JWT_SECRET").unwrap_or_else(|_| "quill-dev-secret".to_string())
}

pub fn token_ttl_days() -> i64 {
    std::env::var("QUILL_TOKEN_TTL_DAYS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(7)
}
