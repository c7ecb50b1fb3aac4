use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use conecta_db::Database;
use conecta_db::models::ConnectionRow;
use conecta_types::api::{
    Claims, ConnectionRequest, ConnectionResponse, Direction, PairState,
};
use conecta_types::events::NotificationEvent;
use conecta_types::models::ConnectionStatus;

use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::mailer::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectionQuery {
    pub status: Option<ConnectionStatus>,
}

/// The row as seen by `viewer`, with the other party's summary attached.
fn respond_for(db: &Database, row: ConnectionRow, viewer: &str) -> anyhow::Result<ConnectionResponse> {
    let other = db
        .get_user_by_id(row.other_party(viewer))?
        .map(|u| convert::summary(&u));
    Ok(convert::connection(row, other))
}

pub async fn request_connection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<ConnectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let addressee = req.addressee_id.to_string();

    let (response, requester_name, addressee_email) = state
        .run_db(move |db| {
            let Some(row) = db.request_connection(&me, &addressee)? else {
                return Ok(None);
            };
            let requester = db
                .get_user_by_id(&me)?
                .ok_or_else(|| anyhow::anyhow!("Requester {} vanished", me))?;
            let addressee = db
                .get_user_by_id(&addressee)?
                .ok_or_else(|| anyhow::anyhow!("Addressee {} vanished", addressee))?;

            let response = convert::connection(row, Some(convert::summary(&addressee)));
            Ok(Some((response, requester.name, addressee.email)))
        })
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    info!(
        "Connection {} requested: {} -> {}",
        response.id, response.requester_id, response.addressee_id
    );
    notify(
        state.mailer.clone(),
        addressee_email,
        NotificationEvent::ConnectionRequested { requester_name },
    );

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn accept_connection(
    state: State<AppState>,
    claims: Extension<Claims>,
    path: ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    respond(state, claims, path, true).await
}

pub async fn reject_connection(
    state: State<AppState>,
    claims: Extension<Claims>,
    path: ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    respond(state, claims, path, false).await
}

async fn respond(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(connection_id): ApiPath<Uuid>,
    accept: bool,
) -> ApiResult<Json<ConnectionResponse>> {
    let me = claims.sub.to_string();
    let id = connection_id.to_string();

    let response = state
        .run_db(move |db| {
            let Some(row) = db.respond_to_connection(&id, &me, accept)? else {
                return Ok(None);
            };
            respond_for(db, row, &me).map(Some)
        })
        .await?
        .ok_or(ApiError::NotFound("Connection"))?;

    info!("Connection {} is now {}", response.id, response.status);
    Ok(Json(response))
}

pub async fn delete_connection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(connection_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let id = connection_id.to_string();

    let deleted = state
        .run_db(move |db| db.delete_connection(&id, &me))
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("Connection"));
    }

    info!("Connection {} deleted by {}", connection_id, claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_connections(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiQuery(query): ApiQuery<ConnectionQuery>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();

    let connections = state
        .run_db(move |db| {
            let rows = db.list_connections(&me, query.status)?;

            let other_ids: Vec<String> = rows
                .iter()
                .map(|r| r.other_party(&me).to_string())
                .collect();
            let users: HashMap<String, _> = db
                .get_users_by_ids(&other_ids)?
                .into_iter()
                .map(|u| (u.id.clone(), convert::summary(&u)))
                .collect();

            Ok(rows
                .into_iter()
                .map(|row| {
                    let other = users.get(row.other_party(&me)).cloned();
                    convert::connection(row, other)
                })
                .collect::<Vec<_>>())
        })
        .await?;

    Ok(Json(connections))
}

pub async fn connection_with(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let me = claims.sub.to_string();
    let other = user_id.to_string();

    let row = {
        let me = me.clone();
        state
            .run_db(move |db| db.connection_between(&me, &other))
            .await?
    };

    let pair = match row {
        Some(row) => PairState {
            status: row.status.to_string(),
            connection_id: Some(convert::uuid(&row.id, "connection id")),
            direction: Some(if row.requester_id == me {
                Direction::Outgoing
            } else {
                Direction::Incoming
            }),
        },
        None => PairState {
            status: "none".into(),
            connection_id: None,
            direction: None,
        },
    };
    Ok(Json(pair))
}
