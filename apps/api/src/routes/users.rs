//! User administration. Admin only.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use salesdesk_core::validation::{validate_email, validate_name};
use salesdesk_core::User;
use salesdesk_db::DbError;

use super::sanitize_patch;
use crate::auth::Auth;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Auth(user): Auth) -> ApiResult<ApiResponse<Vec<User>>> {
    user.require_admin()?;
    let mut users = state.db.users().list().await?;
    users.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(ApiResponse::success(users))
}

pub async fn create(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Json(mut user): Json<User>,
) -> ApiResult<ApiResponse<User>> {
    caller.require_admin()?;
    validate_name("name", &user.name)?;
    user.email = user.email.trim().to_lowercase();
    validate_email(&user.email)?;
    if state.db.users().find_by_email(&user.email).await?.is_some() {
        return Err(DbError::duplicate("email", user.email).into());
    }

    let now = Utc::now();
    user.id = String::new();
    if user.status.is_none() {
        user.status = Some("active".to_string());
    }
    user.created_date = Some(now);
    user.updated_date = Some(now);
    user.extra.insert("created_by".into(), json!(caller.email));

    let user = state.db.users().insert(user).await?;
    info!(user = %user.id, role = %user.role, by = %caller.email, "User created");
    Ok(ApiResponse::created(user))
}

pub async fn update(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> ApiResult<ApiResponse<User>> {
    caller.require_admin()?;
    let mut patch = sanitize_patch(patch)?;
    if let Some(email) = patch.get("email").and_then(Value::as_str) {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;
        if let Some(other) = state.db.users().find_by_email(&email).await? {
            if other.id != id {
                return Err(DbError::duplicate("email", email).into());
            }
        }
    }
    if patch.get("role").is_some() && !caller.role.is_super_admin() {
        return Err(ApiError::forbidden("Only super admins can change roles"));
    }
    if let Some(fields) = patch.as_object_mut() {
        fields.insert("updated_date".into(), json!(Utc::now()));
    }
    let user = state.db.users().update(&id, &patch).await?;
    state.caches.invalidate_sales().await;
    state.caches.invalidate_retail().await;
    Ok(ApiResponse::success(user))
}

/// Deletes the user and drops them from both teams.
pub async fn remove(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    caller.require_admin()?;
    if id == caller.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    state.db.users().delete(&id).await?;
    state.db.sales_members().remove_user(&id).await?;
    state.db.retail_members().remove_user(&id).await?;
    state.caches.invalidate_sales().await;
    state.caches.invalidate_retail().await;
    info!(user = %id, by = %caller.email, "User deleted");
    Ok(ApiResponse::message("User deleted successfully"))
}
