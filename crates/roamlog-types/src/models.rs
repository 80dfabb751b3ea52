use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Directory prefix under which stored media is served.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Public URL for a stored upload filename.
pub fn public_url(filename: &str) -> String {
    format!("{}/{}", UPLOADS_ROUTE, filename)
}

// -- Users --

/// A user as exposed by the profile endpoints. Never carries password data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "userID")]
    pub id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    #[serde(rename = "userEmail")]
    pub email: String,
    #[serde(rename = "userAge")]
    pub age: Option<i64>,
    #[serde(rename = "lastTrip")]
    pub last_trip: Option<String>,
    #[serde(rename = "numOfCitiesTravelled")]
    pub cities_travelled: i64,
    #[serde(rename = "numOfForeignCitiesTravelled")]
    pub foreign_cities_travelled: i64,
    pub created_at: DateTime<Utc>,
}

/// The logged-in user as the client keeps it in its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "userID")]
    pub id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub email: String,
    #[serde(rename = "lastTrip")]
    pub last_trip: String,
    #[serde(rename = "citiesVisited")]
    pub cities_visited: i64,
    #[serde(rename = "foreignCities")]
    pub foreign_cities: i64,
}

/// Aggregate counters shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(rename = "citiesVisited")]
    pub cities_visited: i64,
    #[serde(rename = "foreignCities")]
    pub foreign_cities: i64,
    #[serde(rename = "lastTrip")]
    pub last_trip: String,
}

// -- Travel history --

/// Whether an entry in a user's listing is their own or shared with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryType {
    Personal,
    Shared,
}

impl FromStr for HistoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown history type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub media_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub history_id: i64,
    /// Public path, `/uploads/<file>`.
    pub media_url: String,
    /// Same as `media_url`; older clients read this key.
    pub url: String,
    pub media_type: String,
    pub created_at: DateTime<Utc>,
}

impl Media {
    pub fn from_stored(
        media_id: i64,
        user_id: i64,
        history_id: i64,
        filename: &str,
        media_type: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        let url = public_url(filename);
        Self {
            media_id,
            user_id,
            history_id,
            media_url: url.clone(),
            url,
            media_type,
            created_at,
        }
    }
}

/// One recorded trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelEntry {
    pub history_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub title: String,
    pub area_name: String,
    pub location_name: String,
    pub description: String,
    pub experiences: String,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub history_type: Option<HistoryType>,
    #[serde(default)]
    pub media: Vec<Media>,
}

/// A trip shared with a user, seen from that user's side of the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedHistory {
    pub history_id: i64,
    pub title: String,
    pub area_name: String,
    pub location_name: String,
    #[serde(rename = "startDate")]
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: String,
    pub experiences: String,
    #[serde(rename = "owner_userID")]
    pub owner_id: i64,
    #[serde(rename = "owner_accountName")]
    pub owner_account_name: String,
    pub connection_id: i64,
    #[serde(rename = "Connections_status")]
    pub status: ConnectionStatus,
    #[serde(rename = "other_userID")]
    pub other_user_id: i64,
    #[serde(rename = "other_accountName")]
    pub other_account_name: Option<String>,
    #[serde(default)]
    pub media: Vec<Media>,
}

// -- Future goals --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FutureGoal {
    pub future_goal_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub title: String,
    pub description: String,
    pub target_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Connections --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(format!("unknown connection status '{}'", other)),
        }
    }
}

/// A friend link between two users, scoped to one shared history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: i64,
    #[serde(rename = "requester_userID")]
    pub requester_id: i64,
    #[serde(rename = "receiver_userID")]
    pub receiver_id: i64,
    pub shared_history_id: i64,
    #[serde(rename = "Connections_status")]
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, user_id: i64) -> bool {
        self.requester_id == user_id || self.receiver_id == user_id
    }
}

// -- Likes / comments --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub like_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub history_id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub history_id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
}
