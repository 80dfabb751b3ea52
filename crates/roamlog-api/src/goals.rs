use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use roamlog_db::models::GoalWrite;
use roamlog_types::api::{
    CreateGoalRequest, Envelope, GoalCreatedResponse, GoalsResponse, MessageResponse,
    UpdateGoalRequest,
};

use crate::error::ApiError;
use crate::history::parse_date;
use crate::state::AppState;

/// POST /future-goals
pub async fn create_goal(
    State(state): State<AppState>,
    payload: Result<Json<CreateGoalRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let title = req.title.trim().to_string();
    let (Some(user_id), false) = (req.user_id, title.is_empty()) else {
        return Err(ApiError::bad_request("userID and title are required"));
    };
    let target_date = parse_date(&req.target_date, "target_date")?;
    let description = req.description.unwrap_or_default();

    let outcome = state
        .db("Failed to add future goal", move |db| {
            db.create_goal(user_id, &title, &description, target_date)
        })
        .await?;

    match outcome {
        GoalWrite::Created(goal_id) => Ok((
            StatusCode::CREATED,
            Json(Envelope::ok(GoalCreatedResponse {
                message: "Future goal added".to_string(),
                goal_id,
            })),
        )),
        GoalWrite::UnknownUser => Err(ApiError::not_found("User not found")),
    }
}

/// GET /future-goals/{userID}
pub async fn list_goals(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<GoalsResponse>>, ApiError> {
    let Path(user_id) = path?;
    let goals = state
        .db("Failed to fetch future goals", move |db| db.list_goals(user_id))
        .await?;
    Ok(Json(Envelope::ok(GoalsResponse { goals })))
}

/// PUT /future-goals/{goalID}
pub async fn update_goal(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateGoalRequest>, JsonRejection>,
) -> Result<Json<Envelope<MessageResponse>>, ApiError> {
    let Path(goal_id) = path?;
    let Json(req) = payload?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    let target_date = parse_date(&req.target_date, "target_date")?;
    let description = req.description.unwrap_or_default();

    let updated = state
        .db("Failed to update future goal", move |db| {
            db.update_goal(goal_id, &title, &description, target_date)
        })
        .await?;
    if !updated {
        return Err(ApiError::not_found("Goal not found"));
    }
    Ok(Json(Envelope::ok(MessageResponse::new("Future goal updated"))))
}

/// DELETE /future-goals/{goalID}
pub async fn delete_goal(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<MessageResponse>>, ApiError> {
    let Path(goal_id) = path?;
    let deleted = state
        .db("Failed to delete future goal", move |db| db.delete_goal(goal_id))
        .await?;
    if !deleted {
        return Err(ApiError::not_found("Goal not found"));
    }
    Ok(Json(Envelope::ok(MessageResponse::new("Future goal deleted"))))
}
