use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    config::AdminSeed,
    error::{ApiError, ErrorResponse},
    models::{
        CreateNewsRequest, Credentials, LoginResponse, News, NewsCategory, NewsItem,
        NewsListResponse, NewsResponse, Status, StatusResponse, UpdateNewsRequest, UserResponse,
    },
    password::{self, CredentialError},
    repository::{Repositories, RepositoryError},
    token::{ADMIN_ROLE, LOGIN_TOKEN_TTL},
    validation,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

// --- Helpers ---

/// Parses a numeric route id; anything else is a 400.
fn parse_id(raw: &str, op: &'static str, message: &'static str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| {
        tracing::warn!(op, id = %raw, "invalid route id");
        ApiError::InvalidId(message)
    })
}

/// Argon2 is deliberately slow, so it runs off the async worker threads.
async fn hash_password(plaintext: String, op: &'static str) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| {
            tracing::error!(op, error = %e, "hashing task failed");
            ApiError::Internal
        })?
        .map_err(|e| {
            tracing::error!(op, error = %e, "failed to hash password");
            ApiError::Internal
        })
}

async fn verify_password(
    plaintext: String,
    hash: String,
    op: &'static str,
) -> Result<Result<(), CredentialError>, ApiError> {
    tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| {
            tracing::error!(op, error = %e, "verification task failed");
            ApiError::Internal
        })
}

/// Drops repeated names while keeping first-seen order; a repeated name would
/// otherwise collide on the `(news_id, category_id)` key.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// link_categories
///
/// Upserts each category by name and links it to `news_id`, strictly after
/// the article row exists. Not transactional: the first failure stops the loop
/// and everything written before it (the article, earlier links) stays.
async fn link_categories(
    repos: &Repositories,
    news_id: i32,
    names: &[String],
    op: &'static str,
) -> Result<(), ApiError> {
    for name in names {
        let category = repos.categories.create_category(name).await.map_err(|e| {
            tracing::error!(op, news_id, category = %name, error = %e,
                "could not upsert category, article left partially linked");
            ApiError::ConsistencyGap("failed to link categories")
        })?;

        repos
            .news_categories
            .create_link(NewsCategory {
                news_id,
                category_id: category.id,
            })
            .await
            .map_err(|e| {
                tracing::error!(op, news_id, category = %name, error = %e,
                    "could not link category, article left partially linked");
                ApiError::ConsistencyGap("failed to link categories")
            })?;
    }
    Ok(())
}

// --- User Handlers ---

/// create_user
///
/// [Public Route] Signs a user up. The password is hashed before it reaches the
/// store; a duplicate email surfaces as a generic creation failure.
#[utoipa::path(
    post,
    path = "/users/new",
    request_body = Credentials,
    responses(
        (status = 200, description = "User created", body = UserResponse),
        (status = 400, description = "Malformed or incomplete body", body = ErrorResponse),
        (status = 409, description = "Creation rejected", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    const OP: &str = "handlers.create_user";

    let Json(req) = payload?;
    tracing::info!(op = OP, email = %req.email, "request body decoded");
    validation::validate_credentials(&req)
        .inspect_err(|e| tracing::warn!(op = OP, error = %e, "invalid request"))?;

    let password_hash = hash_password(req.password, OP).await?;
    let user = state
        .repos
        .users
        .create_user(&req.email, &password_hash)
        .await
        .map_err(|e| {
            tracing::error!(op = OP, error = %e, "failed to create user");
            match e {
                RepositoryError::Conflict => ApiError::Conflict("failed to create user"),
                _ => ApiError::Storage("failed to create user"),
            }
        })?;

    tracing::info!(op = OP, user_id = user.id, "user added");
    Ok(Json(UserResponse {
        status: Status::Ok,
        user_id: user.id,
        email: user.email,
    }))
}

/// login
///
/// [Public Route] Exchanges email + password for a 600-second access token.
/// The seeded administrator's token also carries `role = "admin"`.
#[utoipa::path(
    post,
    path = "/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Malformed or incomplete body", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    const OP: &str = "handlers.login";

    let Json(req) = payload?;
    tracing::info!(op = OP, email = %req.email, "request body decoded");
    validation::validate_credentials(&req)
        .inspect_err(|e| tracing::warn!(op = OP, error = %e, "invalid request"))?;

    let user = state
        .repos
        .users
        .find_user_by_email(&req.email)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound(_) => {
                tracing::warn!(op = OP, "user not found with email");
                ApiError::Unauthorized("invalid email")
            }
            e => {
                tracing::error!(op = OP, error = %e, "failed to look up user");
                ApiError::Storage("failed to look up user")
            }
        })?;

    match verify_password(req.password, user.password_hash.clone(), OP).await? {
        Ok(()) => {}
        Err(CredentialError::Mismatch) => {
            tracing::warn!(op = OP, user_id = user.id, "invalid password");
            return Err(ApiError::Unauthorized("invalid password"));
        }
        Err(e) => {
            tracing::error!(op = OP, user_id = user.id, error = %e, "stored hash unusable");
            return Err(ApiError::Internal);
        }
    }

    // Bound to the seeded row's id, so a later account reusing that email
    // never inherits the role.
    let is_admin = state.admin_id == Some(user.id);
    let issued = if is_admin {
        state
            .tokens
            .issue_token_with_role(&user.email, ADMIN_ROLE, LOGIN_TOKEN_TTL)
    } else {
        state.tokens.issue_token(&user.email, LOGIN_TOKEN_TTL)
    };
    let token = issued.map_err(|e| {
        tracing::error!(op = OP, error = %e, "failed to issue token");
        ApiError::Internal
    })?;

    tracing::info!(op = OP, user_id = user.id, "user authenticated");
    Ok(Json(LoginResponse {
        status: Status::Ok,
        user_id: user.id,
        email: user.email,
        token,
    }))
}

/// update_user
///
/// [Authenticated Route] Replaces a user's email and password wholesale. The
/// body is decoded but not validated. Callers may only edit their own account
/// unless they hold the admin role.
#[utoipa::path(
    patch,
    path = "/users/edit/{id}",
    params(("id" = i32, Path, description = "User ID")),
    request_body = Credentials,
    responses(
        (status = 200, description = "Updated", body = StatusResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not the account owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    const OP: &str = "handlers.update_user";

    let id = parse_id(&raw_id, OP, "invalid user id")?;
    let Json(req) = payload?;
    tracing::info!(op = OP, user_id = id, by = %auth.email, "request body decoded");

    let mut user = state.repos.users.find_user_by_id(id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => ApiError::NotFound("user not found"),
        e => {
            tracing::error!(op = OP, error = %e, "failed to find user");
            ApiError::Storage("failed to update user")
        }
    })?;

    // Owners edit their own account; only an admin may edit someone else's.
    if auth.email != user.email && !auth.is_admin() {
        tracing::warn!(op = OP, user_id = id, by = %auth.email, "not the account owner");
        return Err(ApiError::Forbidden);
    }

    user.email = req.email;
    user.password_hash = hash_password(req.password, OP).await?;

    state.repos.users.update_user(&user).await.map_err(|e| {
        tracing::error!(op = OP, user_id = id, error = %e, "failed to update user");
        match e {
            RepositoryError::NotFound(_) => ApiError::NotFound("user not found"),
            RepositoryError::Conflict => ApiError::Conflict("failed to update user"),
            _ => ApiError::Storage("failed to update user"),
        }
    })?;

    tracing::info!(op = OP, user_id = id, "user updated");
    Ok(Json(StatusResponse::ok()))
}

/// delete_user
///
/// [Admin Route] Removes a user account by id.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = StatusResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    const OP: &str = "handlers.delete_user";

    let id = parse_id(&raw_id, OP, "invalid user id")?;
    state.repos.users.delete_user_by_id(id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => ApiError::NotFound("user not found"),
        e => {
            tracing::error!(op = OP, user_id = id, error = %e, "failed to delete user");
            ApiError::Storage("failed to delete user")
        }
    })?;

    tracing::info!(op = OP, user_id = id, by = %admin.email, "user deleted");
    Ok(Json(StatusResponse::ok()))
}

// --- News Handlers ---

/// create_news
///
/// [Authenticated Route] Inserts the article, then upserts and links each
/// category in request order. A failure while linking answers 500 and leaves
/// the article and any earlier links in place.
#[utoipa::path(
    post,
    path = "/news",
    request_body = CreateNewsRequest,
    responses(
        (status = 200, description = "Created", body = NewsResponse),
        (status = 400, description = "Malformed or incomplete body", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Store failure or partial write", body = ErrorResponse)
    )
)]
pub async fn create_news(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateNewsRequest>, JsonRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    const OP: &str = "handlers.create_news";

    let Json(req) = payload?;
    tracing::info!(op = OP, by = %auth.email, title = %req.title, "request body decoded");
    validation::validate_create_news(&req)
        .inspect_err(|e| tracing::warn!(op = OP, error = %e, "invalid request"))?;

    let news = state
        .repos
        .news
        .create_news(&req.title, &req.content)
        .await
        .map_err(|e| {
            tracing::error!(op = OP, error = %e, "failed to create news");
            ApiError::Storage("failed to create news")
        })?;

    let categories = unique_names(req.categories);
    link_categories(&state.repos, news.id, &categories, OP).await?;

    tracing::info!(op = OP, news_id = news.id, "news added");
    Ok(Json(NewsResponse {
        status: Status::Ok,
        id: news.id,
        title: news.title,
        content: news.content,
        categories,
    }))
}

/// list_all_news
///
/// [Authenticated Route] Every article, newest first, each with the category
/// names currently linked to it. One failed category lookup fails the whole
/// listing.
#[utoipa::path(
    get,
    path = "/list",
    responses(
        (status = 200, description = "All news", body = NewsListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn list_all_news(
    State(state): State<AppState>,
) -> Result<Json<NewsListResponse>, ApiError> {
    const OP: &str = "handlers.list_all_news";

    let rows = state.repos.news.list_news().await.map_err(|e| {
        tracing::error!(op = OP, error = %e, "failed to retrieve news");
        ApiError::Storage("failed to retrieve news")
    })?;

    let mut items = Vec::with_capacity(rows.len());
    for News { id, title, content } in rows {
        let categories = state
            .repos
            .news_categories
            .list_category_names(id)
            .await
            .map_err(|e| {
                tracing::error!(op = OP, news_id = id, error = %e, "failed to retrieve categories");
                ApiError::Storage("failed to retrieve news")
            })?;

        items.push(NewsItem {
            id,
            title,
            content,
            categories,
        });
    }

    Ok(Json(NewsListResponse {
        success: true,
        news: items,
    }))
}

/// update_news
///
/// [Authenticated Route] Replaces title and content, drops every existing
/// category link, then re-links the requested categories. Same partial-write
/// behaviour as `create_news` for the re-linking step.
#[utoipa::path(
    patch,
    path = "/news/edit/{id}",
    params(("id" = i32, Path, description = "News ID")),
    request_body = UpdateNewsRequest,
    responses(
        (status = 200, description = "Updated", body = StatusResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "News not found", body = ErrorResponse),
        (status = 500, description = "Store failure or partial write", body = ErrorResponse)
    )
)]
pub async fn update_news(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateNewsRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    const OP: &str = "handlers.update_news";

    let id = parse_id(&raw_id, OP, "failed to decode request")?;
    let Json(req) = payload?;
    tracing::info!(op = OP, news_id = id, by = %auth.email, "request body decoded");

    let mut news = state.repos.news.find_news_by_id(id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => {
            tracing::warn!(op = OP, news_id = id, "failed to find news");
            ApiError::NotFound("news not found")
        }
        e => {
            tracing::error!(op = OP, news_id = id, error = %e, "failed to find news");
            ApiError::Storage("failed to update news")
        }
    })?;

    news.title = req.title;
    news.content = req.content;
    state.repos.news.update_news(&news).await.map_err(|e| {
        tracing::error!(op = OP, news_id = id, error = %e, "failed to update news");
        ApiError::Storage("failed to update news")
    })?;

    state
        .repos
        .news_categories
        .delete_links(id)
        .await
        .map_err(|e| {
            tracing::error!(op = OP, news_id = id, error = %e,
                "failed to delete existing links, article updated without re-linking");
            ApiError::ConsistencyGap("failed to link categories")
        })?;

    let categories = unique_names(req.categories);
    link_categories(&state.repos, id, &categories, OP).await?;

    tracing::info!(op = OP, news_id = id, "news updated");
    Ok(Json(StatusResponse::ok()))
}

/// delete_news
///
/// [Admin Route] Removes an article; its category links cascade with it.
#[utoipa::path(
    delete,
    path = "/admin/news/{id}",
    params(("id" = i32, Path, description = "News ID")),
    responses(
        (status = 200, description = "Deleted", body = StatusResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "News not found", body = ErrorResponse)
    )
)]
pub async fn delete_news(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    const OP: &str = "handlers.delete_news";

    let id = parse_id(&raw_id, OP, "invalid news id")?;
    state.repos.news.delete_news(id).await.map_err(|e| match e {
        RepositoryError::NotFound(_) => ApiError::NotFound("news not found"),
        e => {
            tracing::error!(op = OP, news_id = id, error = %e, "failed to delete news");
            ApiError::Storage("failed to delete news")
        }
    })?;

    tracing::info!(op = OP, news_id = id, by = %admin.email, "news deleted");
    Ok(Json(StatusResponse::ok()))
}

// --- Startup ---

/// The administrator account resolved at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededAdmin {
    pub user_id: i32,
    /// False when the account already existed.
    pub created: bool,
}

/// seed_admin
///
/// Creates the configured administrator account unless its email is already
/// registered. An existing row only counts as the administrator if the
/// configured password verifies against it; otherwise someone else holds that
/// email and `None` is returned, leaving the service without an admin.
pub async fn seed_admin(
    repos: &Repositories,
    seed: &AdminSeed,
) -> Result<Option<SeededAdmin>, ApiError> {
    const OP: &str = "startup.seed_admin";

    match repos.users.find_user_by_email(&seed.email).await {
        Ok(existing) => {
            return match verify_password(seed.password.clone(), existing.password_hash, OP)
                .await?
            {
                Ok(()) => Ok(Some(SeededAdmin {
                    user_id: existing.id,
                    created: false,
                })),
                Err(e) => {
                    tracing::error!(op = OP, user_id = existing.id, error = %e,
                        "admin email is held by an account that does not match the configured password");
                    Ok(None)
                }
            };
        }
        Err(RepositoryError::NotFound(_)) => {}
        Err(e) => {
            tracing::error!(op = OP, error = %e, "failed to look up admin account");
            return Err(ApiError::Storage("failed to seed admin"));
        }
    }

    let password_hash = hash_password(seed.password.clone(), OP).await?;
    let user = repos
        .users
        .create_user(&seed.email, &password_hash)
        .await
        .map_err(|e| {
            tracing::error!(op = OP, error = %e, "failed to create admin account");
            ApiError::Storage("failed to seed admin")
        })?;

    tracing::info!(op = OP, user_id = user.id, email = %seed.email, "admin account created");
    Ok(Some(SeededAdmin {
        user_id: user.id,
        created: true,
    }))
}
