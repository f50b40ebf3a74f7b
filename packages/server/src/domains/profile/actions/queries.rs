//! Profile query actions
//!
//! Read-only; none of these open a transaction.

use std::collections::HashMap;

use tracing::debug;

use crate::common::{AppError, AppResult, ListRequest, Paginated, UserId};
use crate::domains::auth::models::{User, UserQuery};
use crate::domains::auth::repository::{UserDetailRepository, UserRepository};
use crate::domains::auth::types::Actor;
use crate::domains::profile::types::UserProfile;
use crate::kernel::ServerDeps;

/// Page through live users, newest first unless the request sorts
/// otherwise. Admin only.
///
/// Filters and sorts are checked against the user allow-list before any
/// query runs. The page and the total count are fetched concurrently on two
/// connections; either failing fails the call. The total counts only rows
/// matching the filters.
pub async fn list_users(
    request: ListRequest,
    actor: &Actor,
    deps: &ServerDeps,
) -> AppResult<Paginated<UserProfile>> {
    actor.require_admin()?;
    let query = UserQuery::from_request(&request)?;

    let (mut page_conn, mut count_conn) =
        tokio::try_join!(deps.transactor.connect(), deps.transactor.connect())?;
    let (users, total) = tokio::try_join!(
        page_conn.list_users(&query, &request),
        count_conn.count_users(&query)
    )?;

    let mut details: HashMap<UserId, _> = page_conn
        .find_details_for(&User::ids(&users))
        .await?
        .into_iter()
        .map(|detail| (detail.user_id, detail))
        .collect();

    let items = users
        .into_iter()
        .map(|user| {
            let detail = details.remove(&user.id);
            UserProfile { user, detail }
        })
        .collect::<Vec<_>>();

    debug!(count = items.len(), total, page = request.page, "listed users");
    Ok(Paginated::new(items, total, &request))
}

/// The caller's own profile.
pub async fn get_me(actor: &Actor, deps: &ServerDeps) -> AppResult<UserProfile> {
    load_profile(actor.user_id, deps).await
}

/// Admins may read anyone; everyone else only themselves.
pub async fn get_user(user_id: UserId, actor: &Actor, deps: &ServerDeps) -> AppResult<UserProfile> {
    if user_id != actor.user_id {
        actor.require_admin()?;
    }
    load_profile(user_id, deps).await
}

async fn load_profile(user_id: UserId, deps: &ServerDeps) -> AppResult<UserProfile> {
    let mut conn = deps.transactor.connect().await?;
    let user = conn
        .find_user_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let detail = conn.find_detail_by_user_id(user_id).await?;
    Ok(UserProfile { user, detail })
}
