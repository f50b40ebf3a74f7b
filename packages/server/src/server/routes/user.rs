//! `/user/*` endpoints

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::common::{AppResult, ListRequest, Paginated, UserId};
use crate::domains::auth::Actor;
use crate::domains::profile::actions;
use crate::domains::profile::{DeleteUserRequest, UpdateUserRequest, UserProfile};
use crate::server::app::AppState;
use crate::server::response::ApiResponse;

const DEFAULT_PAGE_SIZE: u64 = 20;

/// `filters` and `sort` are base64url encoded JSON arrays.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub filters: String,
    #[serde(default)]
    pub sort: String,
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListQuery>,
) -> AppResult<ApiResponse<Paginated<UserProfile>>> {
    let request = ListRequest::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    )?
    .with_filters(ListRequest::decode_filters(&query.filters)?)?
    .with_sort(ListRequest::decode_sort(&query.sort)?);
    let page = actions::list_users(request, &actor, &state.deps).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn get_me_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> AppResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(actions::get_me(&actor, &state.deps).await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<UserId>,
) -> AppResult<ApiResponse<UserProfile>> {
    Ok(ApiResponse::ok(
        actions::get_user(user_id, &actor, &state.deps).await?,
    ))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<UserId>,
    Json(request): Json<UpdateUserRequest>,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = actions::update_user(user_id, request, &actor, &state.deps).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(user_id): Path<UserId>,
    Json(request): Json<DeleteUserRequest>,
) -> AppResult<ApiResponse<()>> {
    actions::delete_user(user_id, request, &actor, &state.deps).await?;
    Ok(ApiResponse::plain("user deleted"))
}
