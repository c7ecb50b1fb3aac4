use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use conecta_db::queries::OpportunityFilter;
use conecta_db::{AdminDirectory, Database};
use conecta_db::models::OpportunityRow;
use conecta_types::api::{
    Claims, CreateOpportunityRequest, OpportunityResponse, UpdateOpportunityRequest,
};
use conecta_types::models::OpportunityStatus;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::profiles::{DEFAULT_PAGE, MAX_PAGE};
use crate::state::AppState;
use crate::validate;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct OpportunityQuery {
    pub status: Option<OpportunityStatus>,
    pub skill: Option<String>,
    pub creator_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Loads the opportunity and checks that `user_id` created it or is an admin.
pub(crate) fn owned_opportunity(
    db: &Database,
    id: &str,
    user_id: &str,
) -> Result<OpportunityRow, ApiError> {
    let row = db
        .get_opportunity(id)?
        .ok_or(ApiError::NotFound("Opportunity"))?;
    if row.creator_id != user_id && !db.is_admin(user_id)? {
        return Err(ApiError::forbidden(
            "Only the creator or an admin can manage this opportunity",
        ));
    }
    Ok(row)
}

fn description(raw: &str) -> ApiResult<String> {
    Ok(validate::optional_text(raw, "Description", MAX_DESCRIPTION_LEN)?.unwrap_or_default())
}

pub async fn create_opportunity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateOpportunityRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = validate::required_text(&req.title, "Title", MAX_TITLE_LEN)?;
    let description = description(&req.description)?;
    let skills = validate::tags(&req.skills, "skills")?;
    let creator = claims.sub.to_string();

    let row = state
        .run_db(move |db| db.create_opportunity(&creator, &title, &description, &skills))
        .await?;

    info!("Opportunity {} created by {}", row.id, row.creator_id);
    Ok((StatusCode::CREATED, Json(convert::opportunity(row))))
}

pub async fn list_opportunities(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OpportunityQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = OpportunityFilter {
        status: query.status,
        skill: query.skill.filter(|s| !s.trim().is_empty()),
        creator_id: query.creator_id.map(|id| id.to_string()),
        limit: query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset: query.offset.unwrap_or(0),
    };

    let rows = state
        .run_db(move |db| db.list_opportunities(&filter))
        .await?;
    let opportunities: Vec<OpportunityResponse> =
        rows.into_iter().map(convert::opportunity).collect();
    Ok(Json(opportunities))
}

pub async fn get_opportunity(
    State(state): State<AppState>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let id = opportunity_id.to_string();
    let row = state
        .run_db(move |db| db.get_opportunity(&id))
        .await?
        .ok_or(ApiError::NotFound("Opportunity"))?;
    Ok(Json(convert::opportunity(row)))
}

pub async fn update_opportunity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOpportunityRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req
        .title
        .map(|t| validate::required_text(&t, "Title", MAX_TITLE_LEN))
        .transpose()?;
    let description = req.description.map(|d| description(&d)).transpose()?;
    let skills = req
        .skills
        .map(|s| validate::tags(&s, "skills"))
        .transpose()?;
    let status = req.status;

    let me = claims.sub.to_string();
    let id = opportunity_id.to_string();

    let row = state
        .run_db(move |db| {
            let mut row = owned_opportunity(db, &id, &me)?;
            if let Some(title) = title {
                row.title = title;
            }
            if let Some(description) = description {
                row.description = description;
            }
            if let Some(skills) = skills {
                row.skills = skills;
            }
            if let Some(status) = status {
                row.status = status;
            }
            db.update_opportunity(&row)?
                .ok_or_else(|| ApiError::NotFound("Opportunity").into())
        })
        .await?;

    info!("Opportunity {} updated ({})", row.id, row.status);
    Ok(Json(convert::opportunity(row)))
}

pub async fn delete_opportunity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let id = opportunity_id.to_string();

    state
        .run_db(move |db| {
            owned_opportunity(db, &id, &me)?;
            db.delete_opportunity(&id)
        })
        .await?;

    info!("Opportunity {} deleted by {}", opportunity_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
