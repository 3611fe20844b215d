//! Test support shared by the integration test crates.
//!
//! Each test file compiles this module separately and uses a different
//! subset of it.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use news_service::{
    models::{Category, News, NewsCategory, User},
    repository::{
        CategoryRepository, NewsCategoryRepository, NewsRepository, RepositoryError,
        UserRepository,
    },
};

/// InMemoryRepository
///
/// A store that enforces the same constraints as the Postgres schema (unique
/// email, unique category name, composite link key, foreign keys with cascade)
/// without a database.
///
/// Individual operations can be told to start failing with [`fail_after`]
/// to reproduce a store outage in the middle of a multi-step write.
///
/// [`fail_after`]: InMemoryRepository::fail_after
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    news: BTreeMap<i32, News>,
    categories: BTreeMap<i32, Category>,
    links: BTreeSet<NewsCategory>,
    next_user_id: i32,
    next_news_id: i32,
    next_category_id: i32,
    // op name -> number of calls still allowed to succeed
    failures: HashMap<&'static str, usize>,
}

impl Tables {
    fn check(&mut self, op: &'static str) -> Result<(), RepositoryError> {
        match self.failures.get_mut(op) {
            Some(0) => {
                tracing::error!(op, "injected store failure");
                Err(RepositoryError::Unavailable(op.to_string()))
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `op` succeed `successes` more times, then fail on every call.
    /// Operation names match the `op` field the repositories log with, e.g.
    /// `"categories.create"` or `"news_categories.create"`.
    pub async fn fail_after(&self, op: &'static str, successes: usize) {
        self.tables.lock().await.failures.insert(op, successes);
    }

    pub async fn news_count(&self) -> usize {
        self.tables.lock().await.news.len()
    }

    pub async fn category_count(&self) -> usize {
        self.tables.lock().await.categories.len()
    }

    /// Every link row currently stored.
    pub async fn links(&self) -> Vec<NewsCategory> {
        self.tables.lock().await.links.iter().copied().collect()
    }

    /// Id of the category called `name`, if one exists.
    pub async fn category_id(&self, name: &str) -> Option<i32> {
        self.tables
            .lock()
            .await
            .categories
            .values()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("users.create")?;
        if t.users.values().any(|u| u.email == email) {
            tracing::error!(op = "users.create", "email already registered");
            return Err(RepositoryError::Conflict);
        }
        t.next_user_id += 1;
        let user = User {
            id: t.next_user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("users.find_by_email")?;
        t.users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(RepositoryError::NotFound("user"))
    }

    async fn find_user_by_id(&self, id: i32) -> Result<User, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("users.find_by_id")?;
        t.users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("user"))
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("users.update")?;
        if t.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(RepositoryError::Conflict);
        }
        let row = t
            .users
            .get_mut(&user.id)
            .ok_or(RepositoryError::NotFound("user"))?;
        row.email.clone_from(&user.email);
        row.password_hash.clone_from(&user.password_hash);
        Ok(())
    }

    async fn delete_user_by_id(&self, id: i32) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("users.delete")?;
        t.users
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound("user"))
    }
}

#[async_trait]
impl NewsRepository for InMemoryRepository {
    async fn create_news(&self, title: &str, content: &str) -> Result<News, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news.create")?;
        t.next_news_id += 1;
        let news = News {
            id: t.next_news_id,
            title: title.to_string(),
            content: content.to_string(),
        };
        t.news.insert(news.id, news.clone());
        Ok(news)
    }

    async fn list_news(&self) -> Result<Vec<News>, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news.list")?;
        Ok(t.news.values().rev().cloned().collect())
    }

    async fn find_news_by_id(&self, id: i32) -> Result<News, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news.find_by_id")?;
        t.news
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound("news"))
    }

    async fn update_news(&self, news: &News) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news.update")?;
        let row = t
            .news
            .get_mut(&news.id)
            .ok_or(RepositoryError::NotFound("news"))?;
        row.title.clone_from(&news.title);
        row.content.clone_from(&news.content);
        Ok(())
    }

    async fn delete_news(&self, id: i32) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news.delete")?;
        t.news.remove(&id).ok_or(RepositoryError::NotFound("news"))?;
        t.links.retain(|link| link.news_id != id);
        Ok(())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn create_category(&self, name: &str) -> Result<Category, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("categories.create")?;
        if let Some(existing) = t.categories.values().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        t.next_category_id += 1;
        let category = Category {
            id: t.next_category_id,
            name: name.to_string(),
        };
        t.categories.insert(category.id, category.clone());
        Ok(category)
    }
}

#[async_trait]
impl NewsCategoryRepository for InMemoryRepository {
    async fn create_link(&self, link: NewsCategory) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news_categories.create")?;
        if !t.news.contains_key(&link.news_id) || !t.categories.contains_key(&link.category_id) {
            return Err(RepositoryError::MissingReference);
        }
        if !t.links.insert(link) {
            return Err(RepositoryError::Conflict);
        }
        Ok(())
    }

    async fn list_category_names(&self, news_id: i32) -> Result<Vec<String>, RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news_categories.list")?;
        let mut names: Vec<String> = t
            .links
            .iter()
            .filter(|link| link.news_id == news_id)
            .filter_map(|link| t.categories.get(&link.category_id))
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_links(&self, news_id: i32) -> Result<(), RepositoryError> {
        let mut t = self.tables.lock().await;
        t.check("news_categories.delete")?;
        t.links.retain(|link| link.news_id != news_id);
        Ok(())
    }
}
