use std::collections::HashMap;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use conecta_db::Database;
use conecta_db::models::UserRow;
use conecta_db::queries::UserFilter;
use conecta_types::api::{
    AvatarResponse, Claims, Profile, PublicProfile, UpdateProfileRequest,
};
use conecta_types::models::RoleName;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;
use crate::storage::{AVATAR_DIR, avatar_file_name, image_extension};
use crate::validate;

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const MAX_BIO_LEN: usize = 2000;
const MAX_LOCATION_LEN: usize = 120;

pub(crate) const DEFAULT_PAGE: u32 = 20;
pub(crate) const MAX_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub role: Option<RoleName>,
    pub skill: Option<String>,
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// User row plus its roles, as the caller's own view.
pub(crate) fn load_profile(db: &Database, id: &str) -> anyhow::Result<Option<Profile>> {
    let Some(row) = db.get_user_by_id(id)? else {
        return Ok(None);
    };
    let roles = db.roles_for_user(id)?;
    Ok(Some(convert::profile(row, roles)))
}

/// Attach roles to a batch of users with one extra query.
pub(crate) fn with_roles(db: &Database, rows: Vec<UserRow>) -> anyhow::Result<Vec<Profile>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut roles: HashMap<String, Vec<RoleName>> = HashMap::new();
    for (user_id, role) in db.roles_for_users(&ids)? {
        roles.entry(user_id).or_default().push(role);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let user_roles = roles.remove(&row.id).unwrap_or_default();
            convert::profile(row, user_roles)
        })
        .collect())
}

pub async fn list_profiles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProfileQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = UserFilter {
        role: query.role,
        skill: query.skill.filter(|s| !s.trim().is_empty()),
        query: query.q.filter(|q| !q.trim().is_empty()),
        limit: query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset: query.offset.unwrap_or(0),
    };

    let profiles = state
        .run_db(move |db| with_roles(db, db.list_users(&filter)?))
        .await?;

    let public: Vec<PublicProfile> = profiles.into_iter().map(PublicProfile::from).collect();
    Ok(Json(public))
}

pub async fn get_profile(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = user_id.to_string();
    let profile = state
        .run_db(move |db| load_profile(db, &id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(PublicProfile::from(profile)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req
        .name
        .map(|n| validate::required_text(&n, "Name", validate::MAX_NAME_LEN))
        .transpose()?;
    let bio = req
        .bio
        .map(|b| validate::optional_text(&b, "Bio", MAX_BIO_LEN))
        .transpose()?;
    let location = req
        .location
        .map(|l| validate::optional_text(&l, "Location", MAX_LOCATION_LEN))
        .transpose()?;
    let skills = req
        .skills
        .map(|s| validate::tags(&s, "skills"))
        .transpose()?;
    let interests = req
        .interests
        .map(|i| validate::tags(&i, "interests"))
        .transpose()?;

    let id = claims.sub.to_string();
    let profile = state
        .run_db(move |db| {
            let edit = db.update_profile(&id, |p| {
                if let Some(name) = name {
                    p.name = name;
                }
                if let Some(bio) = bio {
                    p.bio = bio;
                }
                if let Some(location) = location {
                    p.location = location;
                }
                if let Some(skills) = skills {
                    p.skills = skills;
                }
                if let Some(interests) = interests {
                    p.interests = interests;
                }
            })?;
            let Some(edit) = edit else {
                return Ok(None);
            };
            let roles = db.roles_for_user(&id)?;
            Ok(Some(convert::profile(edit.current, roles)))
        })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(profile))
}

/// Raw image body. The previous avatar file is removed once the new URL is
/// saved.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let ext = image_extension(content_type)
        .ok_or_else(|| ApiError::UnsupportedMediaType(content_type.to_string()))?;

    let body = body?;
    if body.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }
    if body.is_empty() {
        return Err(ApiError::validation("Avatar body is empty"));
    }

    let id = claims.sub.to_string();
    let file_name = state.storage.put_avatar(&id, ext, &body).await?;
    let avatar_url = format!(
        "{}/storage/{}/{}",
        state.config.public_url, AVATAR_DIR, file_name
    );

    let saved = {
        let id = id.clone();
        let avatar_url = avatar_url.clone();
        state
            .run_db(move |db| {
                Ok(db
                    .update_profile(&id, |p| p.avatar_url = Some(avatar_url))?
                    .map(|edit| (edit.current.completion, edit.previous.avatar_url)))
            })
            .await?
    };

    let Some((completion, previous)) = saved else {
        state.storage.delete_avatar(&file_name).await?;
        return Err(ApiError::NotFound("User"));
    };

    if let Some(old) = previous.as_deref().and_then(|url| avatar_file_name(url, &id)) {
        if old != file_name {
            if let Err(e) = state.storage.delete_avatar(old).await {
                warn!("Failed to remove old avatar {}: {:#}", old, e);
            }
        }
    }

    info!("User {} uploaded avatar {}", id, file_name);
    Ok(Json(AvatarResponse {
        avatar_url,
        completion,
    }))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let id = claims.sub.to_string();
    let avatar_url = {
        let id = id.clone();
        state
            .run_db(move |db| {
                let Some(row) = db.get_user_by_id(&id)? else {
                    return Ok(None);
                };
                db.delete_user(&id)?;
                Ok(Some(row.avatar_url))
            })
            .await?
            .ok_or(ApiError::NotFound("User"))?
    };

    if let Some(file) = avatar_url.as_deref().and_then(|url| avatar_file_name(url, &id)) {
        if let Err(e) = state.storage.delete_avatar(file).await {
            warn!("Failed to remove avatar of deleted user {}: {:#}", id, e);
        }
    }

    info!("User {} deleted their account", id);
    Ok(StatusCode::NO_CONTENT)
}
