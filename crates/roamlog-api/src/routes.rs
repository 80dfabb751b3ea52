use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};

use crate::middleware::require_database;
use crate::state::AppState;
use crate::uploads::{MAX_FILE_SIZE, MAX_FILES};
use crate::{auth, connections, dashboard, goals, history, social, uploads};

/// Room for a full set of images plus the text fields around them.
const BODY_LIMIT: usize = MAX_FILES * MAX_FILE_SIZE + 1024 * 1024;

/// The full API. Routes that touch the database sit behind the liveness
/// gate; upload serving and diagnostics only touch the disk.
///
/// Where a path serves several methods, `{id}` means the user for GET and
/// the addressed row for PUT/DELETE.
pub fn build_router(state: AppState) -> Router {
    let db_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/users", get(auth::list_users))
        .route("/user-profile/{userID}", get(auth::user_profile))
        .route(
            "/travel-history",
            get(history::list_all).post(history::create_history),
        )
        .route(
            "/travel-history/{id}",
            get(history::list_for_user)
                .put(history::update_history)
                .delete(history::delete_history),
        )
        .route("/travel-media/{history_id}", get(history::media))
        .route("/travel-history-by-country", get(history::by_country))
        .route("/search-travel-history", get(history::search))
        .route("/shared-history-details/{userID}", get(history::shared_details))
        .route("/future-goals", post(goals::create_goal))
        .route(
            "/future-goals/{id}",
            get(goals::list_goals)
                .put(goals::update_goal)
                .delete(goals::delete_goal),
        )
        .route("/likes", post(social::create_like))
        .route("/likes/{history_id}", get(social::list_likes))
        .route("/comments", post(social::create_comment))
        .route("/comments/{history_id}", get(social::list_comments))
        .route("/connections", post(connections::create_connection))
        .route(
            "/connections/{id}",
            get(connections::list_connections).delete(connections::delete_connection),
        )
        .route("/connections/{id}/accept", put(connections::accept_connection))
        .route("/dashboard/{userID}", get(dashboard::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_database,
        ));

    let file_routes = Router::new()
        .route("/uploads/{filename}", get(uploads::serve_upload))
        .route("/test-image/{filename}", get(uploads::test_image))
        .route("/list-uploads", get(uploads::list_uploads))
        .route("/test-uploads", get(uploads::test_uploads))
        .route("/uploaded-files", get(uploads::uploaded_files));

    Router::new()
        .merge(db_routes)
        .merge(file_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
