use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `Users` table. Never serialized: the hash stays server-side and
/// handlers answer with the narrower response types below.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: i32,
    // Unique across the table.
    pub email: String,
    // Argon2 PHC string. The plaintext is never stored.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[HASH]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// News
///
/// A row of the `News` table. Its visible category set always comes from the
/// `NewsCategories` join table, never from this struct.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Default)]
pub struct News {
    pub id: i32,
    pub title: String,
    pub content: String,
}

/// A named tag shared across articles. `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

/// NewsCategory
///
/// Join row linking one article to one category. `(news_id, category_id)` is
/// the composite primary key and both columns cascade on parent deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRow)]
pub struct NewsCategory {
    pub news_id: i32,
    pub category_id: i32,
}

// --- Envelope ---

/// Discriminator carried by every JSON envelope except the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

/// StatusResponse
///
/// Bare success envelope returned by update endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusResponse {
    pub status: Status,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: Status::Ok }
    }
}

// --- Request Payloads (Input Schemas) ---

/// Credentials
///
/// Body of `POST /users/new`, `POST /login` and `PATCH /users/edit/{id}`.
/// Missing fields decode as empty strings and are rejected by validation.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// Redacted so a logged request can never leak the plaintext password.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// CreateNewsRequest
///
/// Body of `POST /news`. Field names are capitalised on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNewsRequest {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "Categories", default)]
    pub categories: Vec<String>,
}

/// UpdateNewsRequest
///
/// Body of `PATCH /news/edit/{id}`. The body `Id` is accepted but the path
/// parameter is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNewsRequest {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "Categories", default)]
    pub categories: Vec<String>,
}

// --- Response Payloads (Output Schemas) ---

/// UserResponse
///
/// Returned by `POST /users/new`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserResponse {
    pub status: Status,
    pub user_id: i32,
    pub email: String,
}

/// LoginResponse
///
/// Returned by `POST /login`; `token` is valid for 600 seconds.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub status: Status,
    pub user_id: i32,
    pub email: String,
    pub token: String,
}

/// NewsResponse
///
/// Returned by `POST /news` once the article and every category link exist.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsResponse {
    pub status: Status,
    pub id: i32,
    pub title: String,
    pub content: String,
    pub categories: Vec<String>,
}

/// One article of the `GET /list` response, with its linked category names.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsItem {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "Categories")]
    pub categories: Vec<String>,
}

/// NewsListResponse
///
/// Returned by `GET /list`, newest article first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsListResponse {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "News")]
    pub news: Vec<NewsItem>,
}
