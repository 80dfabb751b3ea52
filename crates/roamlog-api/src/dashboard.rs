use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};

use roamlog_types::api::{DashboardResponse, Envelope};
use roamlog_types::models::UserStats;

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_TRIPS: u32 = 3;
const UPCOMING_GOALS: u32 = 3;

/// GET /dashboard/{userID}
///
/// Stats, recent trips and upcoming goals are independent reads; they run
/// side by side on separate reader connections.
pub async fn dashboard(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<DashboardResponse>>, ApiError> {
    const CONTEXT: &str = "Failed to fetch dashboard data";
    let Path(user_id) = path?;

    let (stats, recent_trips, upcoming_goals) = tokio::try_join!(
        state.db(CONTEXT, move |db| db.user_stats(user_id)),
        state.db(CONTEXT, move |db| db.recent_entries(user_id, RECENT_TRIPS)),
        state.db(CONTEXT, move |db| db.upcoming_goals(user_id, UPCOMING_GOALS)),
    )?;

    let stats = stats.unwrap_or_else(|| UserStats {
        cities_visited: 0,
        foreign_cities: 0,
        last_trip: "Never".to_string(),
    });

    Ok(Json(Envelope::ok(DashboardResponse {
        stats,
        recent_trips,
        upcoming_goals,
    })))
}
