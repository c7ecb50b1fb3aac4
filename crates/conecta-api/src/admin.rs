use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use conecta_db::models::RoleChange;
use conecta_db::queries::UserFilter;
use conecta_db::{AdminDirectory, AuditLogFilter, Database, format_ts};
use conecta_types::api::{
    AdminStats, AssignRoleRequest, AuditLogEntry, AuditLogPage, Claims, Role,
};
use conecta_types::models::{AuditAction, RoleName};

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, query_timestamp};
use crate::profiles::{DEFAULT_PAGE, MAX_PAGE, with_roles};
use crate::state::AppState;
use crate::use_cases::{AuditLogError, GetRoleAuditLogUseCase};
use crate::validate;

const MAX_REASON_LEN: usize = 500;

#[derive(Debug, Deserialize)]
pub struct RemoveRoleQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    pub role_id: Option<i64>,
    pub action: Option<AuditAction>,
    pub performed_by: Option<Uuid>,
    /// RFC 3339 bounds, inclusive.
    #[serde(default, deserialize_with = "query_timestamp")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "query_timestamp")]
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl From<AuditLogQuery> for AuditLogFilter {
    fn from(q: AuditLogQuery) -> Self {
        Self {
            user_id: q.user_id.map(|id| id.to_string()),
            role_id: q.role_id,
            action: q.action,
            performed_by: q.performed_by.map(|id| id.to_string()),
            from: q.from.map(format_ts),
            to: q.to.map(format_ts),
            limit: q.limit,
            offset: q.offset,
        }
    }
}

/// Body of a refused audit log request: the error plus an empty page.
#[derive(Debug, Serialize)]
struct DeniedAuditLog {
    error: String,
    entries: Vec<AuditLogEntry>,
    total: u64,
}

fn ensure_admin(db: &Database, user_id: &str) -> anyhow::Result<()> {
    if !db.is_admin(user_id)? {
        return Err(ApiError::forbidden("Admin role required").into());
    }
    Ok(())
}

fn reason(raw: Option<String>) -> ApiResult<Option<String>> {
    match raw {
        Some(r) => validate::optional_text(&r, "Reason", MAX_REASON_LEN),
        None => Ok(None),
    }
}

pub async fn list_roles(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let roles = state.run_db(|db| db.list_roles()).await?;
    let roles: Vec<Role> = roles.into_iter().map(convert::role).collect();
    Ok(Json(roles))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AssignRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = reason(req.reason)?;
    let metadata = req.metadata.map(serde_json::Value::Object);
    let role = req.role;
    let performer = claims.sub.to_string();
    let target = user_id.to_string();

    let row = state
        .run_db(move |db| {
            ensure_admin(db, &performer)?;
            db.assign_role(&RoleChange {
                user_id: &target,
                role,
                performed_by: &performer,
                reason: reason.as_deref(),
                metadata: metadata.as_ref(),
            })?
            .ok_or_else(|| ApiError::NotFound("User").into())
        })
        .await?;

    info!("Admin {} assigned role {} to {}", claims.sub, role, user_id);
    Ok((StatusCode::CREATED, Json(convert::audit_entry(row))))
}

pub async fn remove_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath((user_id, role)): ApiPath<(Uuid, RoleName)>,
    ApiQuery(query): ApiQuery<RemoveRoleQuery>,
) -> ApiResult<impl IntoResponse> {
    let reason = reason(query.reason)?;
    let performer = claims.sub.to_string();
    let target = user_id.to_string();

    state
        .run_db(move |db| {
            ensure_admin(db, &performer)?;
            db.remove_role(&RoleChange {
                user_id: &target,
                role,
                performed_by: &performer,
                reason: reason.as_deref(),
                metadata: None,
            })?
            .ok_or_else(|| ApiError::NotFound("User").into())
        })
        .await?;

    info!("Admin {} removed role {} from {}", claims.sub, role, user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let stats = state
        .run_db(move |db| {
            ensure_admin(db, &me)?;
            db.stats()
        })
        .await?;

    Ok(Json(AdminStats {
        users: stats.users,
        users_by_role: stats.users_by_role,
        connections: stats.connections,
        opportunities: stats.opportunities,
        interests: stats.interests,
        messages: stats.messages,
    }))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let filter = UserFilter {
        limit: query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset: query.offset.unwrap_or(0),
        ..Default::default()
    };

    let profiles = state
        .run_db(move |db| {
            ensure_admin(db, &me)?;
            with_roles(db, db.list_users(&filter)?)
        })
        .await?;
    Ok(Json(profiles))
}

/// Non-admins get 403 with an empty page alongside the error.
pub async fn audit_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<AuditLogQuery>,
) -> Response {
    let caller = claims.sub.to_string();
    let filter = AuditLogFilter::from(query);

    let outcome = state
        .run_db(move |db| Ok(GetRoleAuditLogUseCase::new(db).execute(&caller, &filter)))
        .await;

    match outcome {
        Ok(Ok(result)) => Json(AuditLogPage {
            entries: result.entries.into_iter().map(convert::audit_entry).collect(),
            total: result.total,
        })
        .into_response(),
        Ok(Err(err @ AuditLogError::NotAdmin)) => (
            StatusCode::FORBIDDEN,
            Json(DeniedAuditLog {
                error: err.to_string(),
                entries: vec![],
                total: 0,
            }),
        )
            .into_response(),
        Ok(Err(AuditLogError::Repository(e))) => ApiError::Internal(e).into_response(),
        Err(e) => e.into_response(),
    }
}
