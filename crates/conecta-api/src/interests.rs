use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use conecta_types::api::{Claims, ExpressInterestRequest, InterestResponse};
use conecta_types::events::NotificationEvent;
use conecta_types::workflow::InterestAction;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::mailer::notify;
use crate::opportunities::owned_opportunity;
use crate::state::AppState;

const MAX_MESSAGE_LEN: usize = 2000;

/// Records the caller's interest and emails the opportunity creator. The
/// email is sent after the write commits and its failure is only logged.
pub async fn express_interest(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ExpressInterestRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = req.message.trim().to_string();
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::validation(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let me = claims.sub.to_string();
    let opp_id = opportunity_id.to_string();

    let (interest, opportunity, applicant, creator) = state
        .run_db(move |db| {
            let (interest, opportunity) = db
                .express_interest(&opp_id, &me, &message)?
                .ok_or(ApiError::NotFound("Opportunity"))?;
            let applicant = db
                .get_user_by_id(&me)?
                .ok_or(ApiError::NotFound("User"))?;
            let creator = db.get_user_by_id(&opportunity.creator_id)?;
            Ok((interest, opportunity, applicant, creator))
        })
        .await?;

    info!(
        "User {} expressed interest {} in opportunity {}",
        interest.user_id, interest.id, interest.opportunity_id
    );

    if let Some(creator) = creator {
        notify(
            state.mailer.clone(),
            creator.email,
            NotificationEvent::InterestReceived {
                opportunity_title: opportunity.title,
                applicant_name: applicant.name,
                message: interest.message.clone(),
            },
        );
    }

    Ok((StatusCode::CREATED, Json(convert::interest(interest))))
}

pub async fn list_for_opportunity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(opportunity_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let opp_id = opportunity_id.to_string();

    let rows = state
        .run_db(move |db| {
            owned_opportunity(db, &opp_id, &me)?;
            db.list_interests_for_opportunity(&opp_id)
        })
        .await?;

    let interests: Vec<InterestResponse> = rows.into_iter().map(convert::interest).collect();
    Ok(Json(interests))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let rows = state
        .run_db(move |db| db.list_interests_for_user(&me))
        .await?;

    let interests: Vec<InterestResponse> = rows.into_iter().map(convert::interest).collect();
    Ok(Json(interests))
}

pub async fn accept_interest(
    state: State<AppState>,
    claims: Extension<Claims>,
    path: ApiPath<Uuid>,
) -> ApiResult<Json<InterestResponse>> {
    transition(state, claims, path, InterestAction::Accept).await
}

pub async fn reject_interest(
    state: State<AppState>,
    claims: Extension<Claims>,
    path: ApiPath<Uuid>,
) -> ApiResult<Json<InterestResponse>> {
    transition(state, claims, path, InterestAction::Reject).await
}

pub async fn withdraw_interest(
    state: State<AppState>,
    claims: Extension<Claims>,
    path: ApiPath<Uuid>,
) -> ApiResult<Json<InterestResponse>> {
    transition(state, claims, path, InterestAction::Withdraw).await
}

async fn transition(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(interest_id): ApiPath<Uuid>,
    action: InterestAction,
) -> ApiResult<Json<InterestResponse>> {
    let me = claims.sub.to_string();
    let id = interest_id.to_string();

    let (interest, opportunity, applicant) = state
        .run_db(move |db| {
            let (interest, opportunity) = db
                .transition_interest(&id, &me, action)?
                .ok_or(ApiError::NotFound("Interest"))?;
            let applicant = db.get_user_by_id(&interest.user_id)?;
            Ok((interest, opportunity, applicant))
        })
        .await?;

    info!("Interest {} is now {}", interest.id, interest.status);

    // The applicant hears about decisions made by the creator
    if matches!(action, InterestAction::Accept | InterestAction::Reject) {
        if let Some(applicant) = applicant {
            notify(
                state.mailer.clone(),
                applicant.email,
                NotificationEvent::InterestReviewed {
                    opportunity_title: opportunity.title,
                    status: interest.status,
                },
            );
        }
    }

    Ok(Json(convert::interest(interest)))
}
