//! User endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::extractors::{ListQuery, UserId, ValidJson};
use crate::http::server::AppState;
use crate::models::{CreateUser, Paginated, UpdateUser, User};
use crate::services::RequestContext;

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            is_active: u.is_active,
            is_superuser: u.is_superuser,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

/// One page of users
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl From<Paginated<User>> for UserListResponse {
    fn from(page: Paginated<User>) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(UserResponse::from);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

/// GET /users - list users with pagination
async fn list_users(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    ListQuery(pagination, sort): ListQuery,
) -> Result<Json<UserListResponse>, ApiError> {
    let page = state.users.list(&ctx, pagination, sort).await?;
    Ok(Json(page.into()))
}

/// POST /users - create a user
async fn create_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    ValidJson(req): ValidJson<CreateUser>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let new = req.validate()?;
    let user = state.users.create(&ctx, new).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    UserId(id): UserId,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get_by_id(&ctx, id).await?;
    Ok(Json(user.into()))
}

/// PATCH /users/{id} - partial update
async fn update_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    UserId(id): UserId,
    ValidJson(req): ValidJson<UpdateUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let changes = req.validate()?;
    let user = state.users.update(&ctx, id, changes).await?;
    Ok(Json(user.into()))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    UserId(id): UserId,
) -> Result<StatusCode, ApiError> {
    state.users.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}
