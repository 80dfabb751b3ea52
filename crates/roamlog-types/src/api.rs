use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Comment, Connection, FutureGoal, Like, Media, SessionUser, SharedHistory, TravelEntry,
    UserProfile, UserStats,
};

// -- Envelope --

/// Every JSON response carries `success` and `timestamp` next to its body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self {
            success: true,
            body,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(rename = "accountName", default)]
    pub account_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "lenient_age")]
    pub age: Option<i64>,
}

/// Form-backed clients send the age as text. A number or a numeric string
/// is an age; null, a missing key or a blank string is none.
fn lenient_age<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAge {
        Number(i64),
        Text(String),
    }

    match Option::<RawAge>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawAge::Number(age)) => Ok(Some(age)),
        Some(RawAge::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid age: {:?}", text)))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewUser {
    #[serde(rename = "userID")]
    pub id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: NewUser,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub user: UserProfile,
}

// -- Travel history --

/// Body of `DELETE /travel-history/{id}` and of the connection actions:
/// the acting user.
#[derive(Debug, Deserialize)]
pub struct ActingUserRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AreaQuery {
    pub area_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub area_name: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySavedResponse {
    pub message: String,
    pub history_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TravelsResponse {
    pub travels: Vec<TravelEntry>,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub media: Vec<Media>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedHistoriesResponse {
    pub shared_histories: Vec<SharedHistory>,
    pub count: usize,
}

// -- Future goals --

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub target_date: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub target_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalCreatedResponse {
    pub message: String,
    pub goal_id: i64,
}

#[derive(Debug, Serialize)]
pub struct GoalsResponse {
    pub goals: Vec<FutureGoal>,
}

// -- Likes / comments --

#[derive(Debug, Deserialize)]
pub struct CreateLikeRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
    pub history_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LikeCreatedResponse {
    pub message: String,
    pub like: Like,
}

#[derive(Debug, Serialize)]
pub struct LikesResponse {
    pub likes: Vec<Like>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<i64>,
    pub history_id: Option<i64>,
    #[serde(default)]
    pub comment_text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentCreatedResponse {
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<Comment>,
}

// -- Connections --

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    #[serde(rename = "requesterID")]
    pub requester_id: Option<i64>,
    #[serde(rename = "receiverID")]
    pub receiver_id: Option<i64>,
    pub history_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub connection: Connection,
}

#[derive(Debug, Serialize)]
pub struct ConnectionsResponse {
    pub connections: Vec<Connection>,
}

// -- Dashboard --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub stats: UserStats,
    pub recent_trips: Vec<TravelEntry>,
    pub upcoming_goals: Vec<FutureGoal>,
}

// -- Upload diagnostics --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUploadsResponse {
    pub uploads_directory: String,
    pub files_available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestUploadsResponse {
    pub files: Vec<String>,
    pub uploads_path: String,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub filename: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadedFilesResponse {
    pub files: Vec<UploadedFile>,
}
