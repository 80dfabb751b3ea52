use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use roamlog_db::models::{ConnectionOutcome, Scoped};
use roamlog_types::api::{
    ActingUserRequest, ConnectionResponse, ConnectionsResponse, CreateConnectionRequest,
    Envelope, MessageResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

fn acting_user(payload: Result<Json<ActingUserRequest>, JsonRejection>) -> Result<i64, ApiError> {
    let Json(req) = payload?;
    req.user_id
        .ok_or_else(|| ApiError::bad_request("userID is required"))
}

fn scoped<T>(outcome: Scoped<T>, action: &str) -> Result<T, ApiError> {
    match outcome {
        Scoped::Done(value) => Ok(value),
        Scoped::NotFound => Err(ApiError::not_found("Connection not found")),
        Scoped::Forbidden => Err(ApiError::Forbidden(format!(
            "User may not {} this connection",
            action
        ))),
    }
}

/// POST /connections
pub async fn create_connection(
    State(state): State<AppState>,
    payload: Result<Json<CreateConnectionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(requester), Some(receiver), Some(history_id)) =
        (req.requester_id, req.receiver_id, req.history_id)
    else {
        return Err(ApiError::bad_request(
            "requesterID, receiverID and history_id are required",
        ));
    };
    if requester == receiver {
        return Err(ApiError::bad_request("Cannot connect a user with themselves"));
    }

    let outcome = state
        .db("Failed to create connection", move |db| {
            db.create_connection(requester, receiver, history_id)
        })
        .await?;

    match outcome {
        ConnectionOutcome::Created(connection) => {
            info!(
                "Connection {} requested: {} -> {} for history {}",
                connection.connection_id, requester, receiver, history_id
            );
            Ok((
                StatusCode::CREATED,
                Json(Envelope::ok(ConnectionResponse { connection })),
            ))
        }
        ConnectionOutcome::Duplicate => {
            Err(ApiError::Conflict("Connection already exists".to_string()))
        }
        ConnectionOutcome::UnknownTarget => {
            Err(ApiError::not_found("User or travel entry not found"))
        }
        ConnectionOutcome::NotParticipant => Err(ApiError::bad_request(
            "Travel entry must belong to one of the connected users",
        )),
    }
}

/// PUT /connections/{id}/accept
pub async fn accept_connection(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ActingUserRequest>, JsonRejection>,
) -> Result<Json<Envelope<ConnectionResponse>>, ApiError> {
    let Path(connection_id) = path?;
    let user_id = acting_user(payload)?;
    let outcome = state
        .db("Failed to accept connection", move |db| {
            db.accept_connection(connection_id, user_id)
        })
        .await?;
    let connection = scoped(outcome, "accept")?;
    Ok(Json(Envelope::ok(ConnectionResponse { connection })))
}

/// GET /connections/{userID}
pub async fn list_connections(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<ConnectionsResponse>>, ApiError> {
    let Path(user_id) = path?;
    let connections = state
        .db("Failed to fetch connections", move |db| {
            db.connections_for_user(user_id)
        })
        .await?;
    Ok(Json(Envelope::ok(ConnectionsResponse { connections })))
}

/// DELETE /connections/{id}
pub async fn delete_connection(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ActingUserRequest>, JsonRejection>,
) -> Result<Json<Envelope<MessageResponse>>, ApiError> {
    let Path(connection_id) = path?;
    let user_id = acting_user(payload)?;
    let outcome = state
        .db("Failed to delete connection", move |db| {
            db.delete_connection(connection_id, user_id)
        })
        .await?;
    scoped(outcome, "delete")?;
    Ok(Json(Envelope::ok(MessageResponse::new("Connection deleted"))))
}
