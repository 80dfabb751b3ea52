use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::info;

use roamlog_db::models::{DATE_FORMAT, HistoryDelete, HistoryWrite, NewTravelEntry};
use roamlog_types::api::{
    ActingUserRequest, AreaQuery, Envelope, HistorySavedResponse, MediaResponse,
    MessageResponse, SearchQuery, SharedHistoriesResponse, TravelsResponse,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::uploads::{Staged, UploadStore};

/// Text fields of the travel-history multipart form.
#[derive(Debug, Default)]
struct HistoryForm {
    user_id: Option<String>,
    title: Option<String>,
    area_name: Option<String>,
    location_name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    description: Option<String>,
    experiences: Option<String>,
}

impl HistoryForm {
    fn into_entry(self) -> Result<NewTravelEntry, ApiError> {
        let (Some(user_id), Some(title), Some(area_name), Some(location_name), Some(start), Some(end)) = (
            required(self.user_id),
            required(self.title),
            required(self.area_name),
            required(self.location_name),
            required(self.start_date),
            required(self.end_date),
        ) else {
            return Err(ApiError::bad_request("Missing required fields"));
        };

        let user_id = user_id
            .parse::<i64>()
            .map_err(|_| ApiError::bad_request("Invalid userID"))?;
        let start_date = parse_date(&start, "startDate")?;
        let end_date = parse_date(&end, "endDate")?;
        if end_date < start_date {
            return Err(ApiError::bad_request("End date cannot be before start date"));
        }

        Ok(NewTravelEntry {
            user_id,
            title,
            area_name,
            location_name,
            description: self.description.unwrap_or_default(),
            experiences: self.experiences.unwrap_or_default(),
            start_date,
            end_date,
        })
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::bad_request(format!("Invalid {}: expected YYYY-MM-DD", field)))
}

/// Drain the multipart body: text fields into the form, `images` to disk.
/// Whatever was written is removed again if reading fails part way.
async fn read_form(
    store: &UploadStore,
    mut multipart: Multipart,
) -> Result<(NewTravelEntry, Staged), ApiError> {
    let mut staged = store.staging();
    match read_fields(store, &mut multipart, &mut staged).await {
        Ok(entry) => Ok((entry, staged)),
        Err(e) => {
            staged.discard().await;
            Err(e)
        }
    }
}

async fn read_fields(
    store: &UploadStore,
    multipart: &mut Multipart,
    staged: &mut Staged,
) -> Result<NewTravelEntry, ApiError> {
    let mut form = HistoryForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            store.save_image(staged, field).await?;
            continue;
        }

        let value = field.text().await?;
        let slot = match name.as_str() {
            "userID" => &mut form.user_id,
            "title" => &mut form.title,
            "area_name" => &mut form.area_name,
            "location_name" => &mut form.location_name,
            "startDate" => &mut form.start_date,
            "endDate" => &mut form.end_date,
            "description" => &mut form.description,
            "experiences" => &mut form.experiences,
            _ => continue,
        };
        *slot = Some(value);
    }
    form.into_entry()
}

/// POST /travel-history
pub async fn create_history(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (entry, staged) = read_form(&state.uploads, multipart?).await?;

    let files = staged.filenames().to_vec();
    let result = state
        .db("Failed to add history", move |db| db.create_history(&entry, &files))
        .await;

    match result {
        Ok(HistoryWrite::Saved(history_id)) => {
            let kept = staged.keep();
            info!("History {} stored with {} photo(s)", history_id, kept.len());
            Ok((
                StatusCode::CREATED,
                Json(Envelope::ok(HistorySavedResponse {
                    message: "Travel history added".to_string(),
                    history_id,
                })),
            ))
        }
        Ok(HistoryWrite::NotFound) => {
            staged.discard().await;
            Err(ApiError::not_found("User not found"))
        }
        Err(e) => {
            staged.discard().await;
            Err(e)
        }
    }
}

/// PUT /travel-history/{history_id}
pub async fn update_history(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<HistorySavedResponse>>, ApiError> {
    let Path(history_id) = path?;
    let (entry, staged) = read_form(&state.uploads, multipart?).await?;

    let files = staged.filenames().to_vec();
    let result = state
        .db("Failed to update history", move |db| {
            db.update_history(history_id, &entry, &files)
        })
        .await;

    match result {
        Ok(HistoryWrite::Saved(history_id)) => {
            let kept = staged.keep();
            info!("History {} updated, {} new photo(s)", history_id, kept.len());
            Ok(Json(Envelope::ok(HistorySavedResponse {
                message: "Travel history updated".to_string(),
                history_id,
            })))
        }
        Ok(HistoryWrite::NotFound) => {
            staged.discard().await;
            Err(ApiError::not_found(
                "Travel history not found or not owned by user",
            ))
        }
        Err(e) => {
            staged.discard().await;
            Err(e)
        }
    }
}

/// DELETE /travel-history/{history_id}
pub async fn delete_history(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ActingUserRequest>, JsonRejection>,
) -> Result<Json<Envelope<MessageResponse>>, ApiError> {
    let Path(history_id) = path?;
    let Json(req) = payload?;
    let user_id = req
        .user_id
        .ok_or_else(|| ApiError::bad_request("userID is required"))?;

    let outcome = state
        .db("Failed to delete history", move |db| {
            db.delete_history(history_id, user_id)
        })
        .await?;

    match outcome {
        HistoryDelete::Deleted { files } => {
            // Post-commit, best effort.
            state.uploads.remove_files(&files).await;
            Ok(Json(Envelope::ok(MessageResponse::new(
                "Travel history deleted successfully",
            ))))
        }
        HistoryDelete::NotFound => Err(ApiError::not_found(
            "Travel history not found or not owned by user",
        )),
    }
}

/// GET /travel-history
pub async fn list_all(
    State(state): State<AppState>,
) -> Result<Json<Envelope<TravelsResponse>>, ApiError> {
    let travels = state
        .db("Failed to fetch travel history", |db| db.list_all_entries())
        .await?;
    Ok(Json(Envelope::ok(TravelsResponse { travels })))
}

/// GET /travel-history/{userID}
pub async fn list_for_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<TravelsResponse>>, ApiError> {
    let Path(user_id) = path?;
    let travels = state
        .db("Failed to fetch travel history", move |db| {
            db.list_user_entries(user_id, None)
        })
        .await?;
    Ok(Json(Envelope::ok(TravelsResponse { travels })))
}

/// GET /travel-media/{history_id}
pub async fn media(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<MediaResponse>>, ApiError> {
    let Path(history_id) = path?;
    let media = state
        .db("Failed to fetch media", move |db| db.media_for_history(history_id))
        .await?;
    Ok(Json(Envelope::ok(MediaResponse { media })))
}

/// GET /travel-history-by-country?area_name=
pub async fn by_country(
    State(state): State<AppState>,
    query: Result<Query<AreaQuery>, QueryRejection>,
) -> Result<Json<Envelope<TravelsResponse>>, ApiError> {
    let Query(query) = query?;
    let area = required(query.area_name)
        .ok_or_else(|| ApiError::bad_request("area_name is required"))?;

    let travels = state
        .db("Failed to fetch travel history", move |db| db.entries_by_area(&area))
        .await?;
    Ok(Json(Envelope::ok(TravelsResponse { travels })))
}

/// GET /search-travel-history?area_name=&userID=
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Envelope<TravelsResponse>>, ApiError> {
    let Query(query) = query?;
    let (Some(area), Some(user_id)) = (required(query.area_name), query.user_id) else {
        return Err(ApiError::bad_request("area_name and userID are required"));
    };

    let travels = state
        .db("Failed to search travel history", move |db| {
            db.list_user_entries(user_id, Some(&area))
        })
        .await?;
    Ok(Json(Envelope::ok(TravelsResponse { travels })))
}

/// GET /shared-history-details/{userID}
pub async fn shared_details(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<SharedHistoriesResponse>>, ApiError> {
    let Path(user_id) = path?;
    let shared = state
        .db("Failed to fetch shared history", move |db| {
            db.shared_history_details(user_id)
        })
        .await?;
    Ok(Json(Envelope::ok(SharedHistoriesResponse {
        count: shared.len(),
        shared_histories: shared,
    })))
}
