use crate::models::{Category, News, NewsCategory, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// Every Storage Gateway operation returns this. The underlying cause has
/// already been logged by the repository when the caller sees it.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique or primary-key constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// A foreign-key constraint rejected the write.
    #[error("referenced row does not exist")]
    MissingReference,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => Self::Conflict,
            Some(db) if db.is_foreign_key_violation() => Self::MissingReference,
            _ => Self::Database(e),
        }
    }
}

// --- Repository Traits ---
//
// One narrow contract per entity family. Handlers only ever see these traits,
// injected through `Repositories`, so the store behind them can be Postgres or
// a test double.

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user and returns the stored row with its generated id.
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<User, RepositoryError>;
    async fn find_user_by_id(&self, id: i32) -> Result<User, RepositoryError>;
    /// Replaces email and password hash of the row with `user.id`.
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;
    async fn delete_user_by_id(&self, id: i32) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn create_news(&self, title: &str, content: &str) -> Result<News, RepositoryError>;
    /// All articles, newest (highest id) first.
    async fn list_news(&self) -> Result<Vec<News>, RepositoryError>;
    async fn find_news_by_id(&self, id: i32) -> Result<News, RepositoryError>;
    /// Replaces title and content of the row with `news.id`.
    async fn update_news(&self, news: &News) -> Result<(), RepositoryError>;
    /// Removes the article; its category links go with it.
    async fn delete_news(&self, id: i32) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Upsert keyed on the unique name: inserting an existing name returns the
    /// existing row instead of failing or duplicating it.
    async fn create_category(&self, name: &str) -> Result<Category, RepositoryError>;
}

#[async_trait]
pub trait NewsCategoryRepository: Send + Sync {
    async fn create_link(&self, link: NewsCategory) -> Result<(), RepositoryError>;
    /// Names of every category linked to `news_id`; empty when there are none.
    async fn list_category_names(&self, news_id: i32) -> Result<Vec<String>, RepositoryError>;
    /// Drops every link of `news_id`.
    async fn delete_links(&self, news_id: i32) -> Result<(), RepositoryError>;
}

/// Repositories
///
/// The Storage Gateway as handed to handlers: one shared trait object per
/// entity family, cloned cheaply into every request.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub news: Arc<dyn NewsRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub news_categories: Arc<dyn NewsCategoryRepository>,
}

impl Repositories {
    /// Builds all four views from a single store that implements every trait.
    pub fn from_store<R>(store: Arc<R>) -> Self
    where
        R: UserRepository + NewsRepository + CategoryRepository + NewsCategoryRepository + 'static,
    {
        Self {
            users: store.clone(),
            news: store.clone(),
            categories: store.clone(),
            news_categories: store,
        }
    }
}

/// Idempotent schema creation, run once at startup.
pub async fn create_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    const STATEMENTS: [(&str, &str); 4] = [
        (
            "news",
            r#"CREATE TABLE IF NOT EXISTS news (
                id SERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
        ),
        (
            "categories",
            r#"CREATE TABLE IF NOT EXISTS categories (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )"#,
        ),
        (
            "news_categories",
            r#"CREATE TABLE IF NOT EXISTS news_categories (
                news_id INT NOT NULL REFERENCES news(id) ON DELETE CASCADE,
                category_id INT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (news_id, category_id)
            )"#,
        ),
        (
            "users",
            r#"CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                email VARCHAR(100) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
        ),
    ];

    for (table, ddl) in STATEMENTS {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            tracing::error!(table, error = %e, "failed to create table");
            e
        })?;
    }
    Ok(())
}

/// PostgresRepository
///
/// The production Storage Gateway. One pooled handle backs all four traits;
/// every query is parameterized. Dropping the calling future (client gone,
/// request deadline hit) abandons the in-flight query.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Logs a failed query with its operation name before converting it.
fn db_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        tracing::error!(op, error = %e, "query failed");
        RepositoryError::from(e)
    }
}

fn not_found(op: &'static str, entity: &'static str, id: impl std::fmt::Display) -> RepositoryError {
    tracing::warn!(op, %id, "{entity} not found");
    RepositoryError::NotFound(entity)
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2) \
             RETURNING id, email, password_hash, created_at",
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("users.create"))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("users.find_by_email"))?
        .ok_or_else(|| not_found("users.find_by_email", "user", email))
    }

    async fn find_user_by_id(&self, id: i32) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("users.find_by_id"))?
        .ok_or_else(|| not_found("users.find_by_id", "user", id))
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET email = $1, password_hash = $2 WHERE id = $3")
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.id)
            .execute(&self.pool)
            .await
            .map_err(db_error("users.update"))?;

        match result.rows_affected() {
            0 => Err(not_found("users.update", "user", user.id)),
            _ => Ok(()),
        }
    }

    async fn delete_user_by_id(&self, id: i32) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("users.delete"))?;

        match result.rows_affected() {
            0 => Err(not_found("users.delete", "user", id)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl NewsRepository for PostgresRepository {
    async fn create_news(&self, title: &str, content: &str) -> Result<News, RepositoryError> {
        sqlx::query_as::<_, News>(
            "INSERT INTO news (title, content) VALUES ($1, $2) RETURNING id, title, content",
        )
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("news.create"))
    }

    async fn list_news(&self) -> Result<Vec<News>, RepositoryError> {
        sqlx::query_as::<_, News>("SELECT id, title, content FROM news ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("news.list"))
    }

    async fn find_news_by_id(&self, id: i32) -> Result<News, RepositoryError> {
        sqlx::query_as::<_, News>("SELECT id, title, content FROM news WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("news.find_by_id"))?
            .ok_or_else(|| not_found("news.find_by_id", "news", id))
    }

    async fn update_news(&self, news: &News) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE news SET title = $1, content = $2 WHERE id = $3")
            .bind(&news.title)
            .bind(&news.content)
            .bind(news.id)
            .execute(&self.pool)
            .await
            .map_err(db_error("news.update"))?;

        match result.rows_affected() {
            0 => Err(not_found("news.update", "news", news.id)),
            _ => Ok(()),
        }
    }

    async fn delete_news(&self, id: i32) -> Result<(), RepositoryError> {
        // news_categories rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM news WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("news.delete"))?;

        match result.rows_affected() {
            0 => Err(not_found("news.delete", "news", id)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CategoryRepository for PostgresRepository {
    async fn create_category(&self, name: &str) -> Result<Category, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("categories.create"))
    }
}

#[async_trait]
impl NewsCategoryRepository for PostgresRepository {
    async fn create_link(&self, link: NewsCategory) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO news_categories (news_id, category_id) VALUES ($1, $2)")
            .bind(link.news_id)
            .bind(link.category_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("news_categories.create"))?;
        Ok(())
    }

    async fn list_category_names(&self, news_id: i32) -> Result<Vec<String>, RepositoryError> {
        sqlx::query_scalar::<_, Vec<String>>(
            "SELECT COALESCE(array_agg(c.name ORDER BY c.name), '{}'::text[]) \
             FROM categories c \
             JOIN news_categories nc ON nc.category_id = c.id \
             WHERE nc.news_id = $1",
        )
        .bind(news_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("news_categories.list"))
    }

    async fn delete_links(&self, news_id: i32) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM news_categories WHERE news_id = $1")
            .bind(news_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("news_categories.delete"))?;
        Ok(())
    }
}
