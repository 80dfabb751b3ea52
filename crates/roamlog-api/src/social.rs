use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use roamlog_db::models::{CommentOutcome, LikeOutcome};
use roamlog_types::api::{
    CommentCreatedResponse, CommentsResponse, CreateCommentRequest, CreateLikeRequest, Envelope,
    LikeCreatedResponse, LikesResponse,
};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /likes
pub async fn create_like(
    State(state): State<AppState>,
    payload: Result<Json<CreateLikeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(user_id), Some(history_id)) = (req.user_id, req.history_id) else {
        return Err(ApiError::bad_request("userID and history_id are required"));
    };

    let outcome = state
        .db("Failed to add like", move |db| db.insert_like(user_id, history_id))
        .await?;

    match outcome {
        LikeOutcome::Created(like) => Ok((
            StatusCode::CREATED,
            Json(Envelope::ok(LikeCreatedResponse {
                message: "Like added".to_string(),
                like,
            })),
        )),
        LikeOutcome::AlreadyLiked => Err(ApiError::Conflict(
            "User has already liked this travel entry".to_string(),
        )),
        LikeOutcome::UnknownTarget => Err(ApiError::not_found("User or travel entry not found")),
    }
}

/// GET /likes/{history_id}
pub async fn list_likes(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<LikesResponse>>, ApiError> {
    let Path(history_id) = path?;
    let likes = state
        .db("Failed to fetch likes", move |db| db.likes_for_history(history_id))
        .await?;
    Ok(Json(Envelope::ok(LikesResponse {
        count: likes.len(),
        likes,
    })))
}

/// POST /comments
pub async fn create_comment(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let text = req.comment_text.trim().to_string();
    let (Some(user_id), Some(history_id), false) = (req.user_id, req.history_id, text.is_empty())
    else {
        return Err(ApiError::bad_request(
            "userID, history_id and comment_text are required",
        ));
    };

    let outcome = state
        .db("Failed to add comment", move |db| {
            db.insert_comment(user_id, history_id, &text)
        })
        .await?;

    match outcome {
        CommentOutcome::Created(comment) => Ok((
            StatusCode::CREATED,
            Json(Envelope::ok(CommentCreatedResponse { comment })),
        )),
        CommentOutcome::UnknownTarget => {
            Err(ApiError::not_found("User or travel entry not found"))
        }
    }
}

/// GET /comments/{history_id}
pub async fn list_comments(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<CommentsResponse>>, ApiError> {
    let Path(history_id) = path?;
    let comments = state
        .db("Failed to fetch comments", move |db| {
            db.comments_for_history(history_id)
        })
        .await?;
    Ok(Json(Envelope::ok(CommentsResponse { comments })))
}
