use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use roamlog_api::build_router;
use roamlog_api::state::AppStateInner;
use roamlog_api::uploads::UploadStore;
use roamlog_db::{DbPool, PoolOptions};

const BOUNDARY: &str = "roamlog-test-boundary";

struct TestApp {
    router: Router,
    pool: DbPool,
    dir: TempDir,
}

#[derive(Clone, Copy)]
enum Part<'a> {
    Text(&'a str, &'a str),
    Image(&'a str, &'a str, &'a [u8]),
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("db")).unwrap();
        let pool = DbPool::connect(
            dir.path().join("db").join("roamlog.db"),
            PoolOptions {
                readers: 2,
                reconnect_delay: Duration::from_millis(50),
            },
        )
        .unwrap();
        let uploads = UploadStore::new(dir.path().join("uploads")).await.unwrap();
        let router = build_router(AppStateInner::new(pool.clone(), uploads));
        Self { router, pool, dir }
    }

    fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn multipart(&self, method: &str, uri: &str, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(req).await
    }

    async fn signup(&self, name: &str) -> i64 {
        let (status, body) = self
            .json(
                "POST",
                "/signup",
                json!({
                    "accountName": name,
                    "email": format!("{}@example.com", name),
                    "password": "correct horse",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["user"]["userID"].as_i64().unwrap()
    }

    async fn add_trip(&self, user_id: i64, area: &str, images: &[Part<'_>]) -> (StatusCode, Value) {
        let user = user_id.to_string();
        let title = format!("Trip to {}", area);
        let mut parts = vec![
            Part::Text("userID", &user),
            Part::Text("title", &title),
            Part::Text("area_name", area),
            Part::Text("location_name", "Old town"),
            Part::Text("startDate", "2024-04-01"),
            Part::Text("endDate", "2024-04-05"),
            Part::Text("experiences", "Great food"),
        ];
        parts.extend(images.iter().copied());
        self.multipart("POST", "/travel-history", &parts).await
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::Image(content_type, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"images\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn png(name: &str) -> Part<'_> {
    Part::Image("image/png", name, b"\x89PNG fake image bytes")
}

#[tokio::test]
async fn signup_then_login() {
    let app = TestApp::new().await;
    let id = app.signup("ana").await;

    let (status, body) = app
        .json(
            "POST",
            "/login",
            json!({"email": "ana@example.com", "password": "correct horse"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["userID"], id);
    assert_eq!(body["user"]["lastTrip"], "No trips recorded");
    assert_eq!(body["user"]["citiesVisited"], 0);
    assert!(body["timestamp"].is_string());

    let (status, body) = app
        .json(
            "POST",
            "/login",
            json!({"email": "ana@example.com", "password": "wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict_and_adds_no_row() {
    let app = TestApp::new().await;
    app.signup("ana").await;

    let (status, body) = app
        .json(
            "POST",
            "/signup",
            json!({"accountName": "someone", "email": "ana@example.com", "password": "pw"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Email already exists");

    let (status, body) = app
        .json(
            "POST",
            "/signup",
            json!({"accountName": "ana", "email": "other@example.com", "password": "pw"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Username already taken");

    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert!(body["users"][0].get("password_hash").is_none());
}

#[tokio::test]
async fn signup_requires_all_fields() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json("POST", "/signup", json!({"email": "x@example.com"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn signup_accepts_age_sent_as_form_text() {
    let app = TestApp::new().await;
    let cases = [("ana", json!("25"), json!(25)), ("ben", json!(""), Value::Null)];
    for (name, age, stored) in cases {
        let (status, body) = app
            .json(
                "POST",
                "/signup",
                json!({
                    "accountName": name,
                    "email": format!("{}@example.com", name),
                    "password": "correct horse",
                    "age": age,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let id = body["user"]["userID"].as_i64().unwrap();
        let (status, profile) = app.get(&format!("/user-profile/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["user"]["userAge"], stored);
    }
}

#[tokio::test]
async fn non_numeric_path_ids_get_a_json_error() {
    let app = TestApp::new().await;
    for uri in ["/dashboard/abc", "/travel-history/abc", "/likes/x1", "/user-profile/me"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false, "{}", uri);
        assert!(body["message"].is_string(), "{}", uri);
        assert!(body["timestamp"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn each_image_becomes_a_media_row_and_a_file() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;

    let (status, body) = app
        .add_trip(ana, "Lisbon", &[png("a.png"), png("b.PNG"), png("c.jpeg")])
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let history_id = body["historyId"].as_i64().unwrap();

    let files = app.stored_files();
    assert_eq!(files.len(), 3);
    assert_eq!(files.iter().filter(|f| f.ends_with(".jpg")).count(), 1);

    let (status, body) = app.get(&format!("/travel-media/{}", history_id)).await;
    assert_eq!(status, StatusCode::OK);
    let media = body["media"].as_array().unwrap();
    assert_eq!(media.len(), 3);
    let url = media[0]["url"].as_str().unwrap().to_string();
    assert_eq!(media[0]["media_url"], media[0]["url"]);
    assert!(url.starts_with("/uploads/"));

    let response = app
        .router
        .clone()
        .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("image/"));

    let (_, body) = app.get(&format!("/travel-history/{}", ana)).await;
    assert_eq!(body["travels"][0]["media"].as_array().unwrap().len(), 3);
    assert_eq!(body["travels"][0]["history_type"], "personal");

    let (_, body) = app.get(&format!("/user-profile/{}", ana)).await;
    assert_eq!(body["user"]["lastTrip"], "Lisbon");
    assert_eq!(body["user"]["numOfCitiesTravelled"], 1);
}

#[tokio::test]
async fn late_failure_leaves_no_rows_and_no_files() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;

    app.pool
        .current()
        .unwrap()
        .with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_aggregates BEFORE UPDATE ON users
                 BEGIN SELECT RAISE(ABORT, 'aggregate refresh failed'); END;",
            )?;
            Ok(())
        })
        .unwrap();

    let (status, body) = app.add_trip(ana, "Lisbon", &[png("a.png"), png("b.png")]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to add history");
    assert!(!body.to_string().contains("aggregate refresh failed"));

    assert!(app.stored_files().is_empty());
    let (_, body) = app.get("/travel-history").await;
    assert!(body["travels"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upload_limits_are_enforced_and_cleaned_up() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;

    let six: Vec<Part> = (0..6).map(|_| png("x.png")).collect();
    let (status, _) = app.add_trip(ana, "Lisbon", &six).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.stored_files().is_empty());

    let (status, body) = app
        .add_trip(ana, "Lisbon", &[png("ok.png"), Part::Image("text/plain", "notes.txt", b"hi")])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only image files are allowed");
    assert!(app.stored_files().is_empty());

    let big = vec![0u8; 5 * 1024 * 1024 + 1];
    let (status, _) = app
        .add_trip(ana, "Lisbon", &[Part::Image("image/jpeg", "big.jpg", &big)])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn missing_fields_and_bad_dates_are_rejected() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    let user = ana.to_string();

    let (status, _) = app
        .multipart(
            "POST",
            "/travel-history",
            &[Part::Text("userID", &user), png("a.png")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.stored_files().is_empty());

    let (status, _) = app
        .multipart(
            "POST",
            "/travel-history",
            &[
                Part::Text("userID", &user),
                Part::Text("title", "Backwards"),
                Part::Text("area_name", "Rome"),
                Part::Text("location_name", "Centre"),
                Part::Text("startDate", "2024-05-10"),
                Part::Text("endDate", "2024-05-01"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn edit_trip(app: &TestApp, history_id: i64, user_id: i64) -> (StatusCode, Value) {
    let user = user_id.to_string();
    app.multipart(
        "PUT",
        &format!("/travel-history/{}", history_id),
        &[
            Part::Text("userID", &user),
            Part::Text("title", "Lisbon again"),
            Part::Text("area_name", "Porto"),
            Part::Text("location_name", "Ribeira"),
            Part::Text("startDate", "2024-06-01"),
            Part::Text("endDate", "2024-06-03"),
            png("new.png"),
        ],
    )
    .await
}

#[tokio::test]
async fn update_is_scoped_to_the_owner() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    let ben = app.signup("ben").await;
    let (_, body) = app.add_trip(ana, "Lisbon", &[]).await;
    let history_id = body["historyId"].as_i64().unwrap();

    let (status, _) = edit_trip(&app, history_id, ben).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.stored_files().is_empty());

    let (status, body) = edit_trip(&app, history_id, ana).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(app.stored_files().len(), 1);

    let (_, body) = app.get(&format!("/user-profile/{}", ana)).await;
    assert_eq!(body["user"]["lastTrip"], "Porto");
}

#[tokio::test]
async fn delete_cascades_and_only_for_the_owner() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    let ben = app.signup("ben").await;
    let (_, body) = app.add_trip(ana, "Lisbon", &[png("a.png")]).await;
    let history_id = body["historyId"].as_i64().unwrap();

    app.json("POST", "/likes", json!({"userID": ben, "history_id": history_id}))
        .await;
    app.json(
        "POST",
        "/comments",
        json!({"userID": ben, "history_id": history_id, "comment_text": "Nice"}),
    )
    .await;

    let uri = format!("/travel-history/{}", history_id);
    let (status, _) = app.json("DELETE", &uri, json!({"userID": ben})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.stored_files().len(), 1);

    let (status, _) = app.json("DELETE", &uri, json!({"userID": ana})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.stored_files().is_empty());

    let (_, body) = app.get(&format!("/likes/{}", history_id)).await;
    assert_eq!(body["count"], 0);
    let (_, body) = app.get(&format!("/comments/{}", history_id)).await;
    assert!(body["comments"].as_array().unwrap().is_empty());
    let (_, body) = app.get(&format!("/user-profile/{}", ana)).await;
    assert_eq!(body["user"]["numOfCitiesTravelled"], 0);
}

#[tokio::test]
async fn liking_twice_conflicts() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    let (_, body) = app.add_trip(ana, "Lisbon", &[]).await;
    let history_id = body["historyId"].as_i64().unwrap();

    let like = json!({"userID": ana, "history_id": history_id});
    let (status, body) = app.json("POST", "/likes", like.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["like"]["accountName"], "ana");

    let (status, body) = app.json("POST", "/likes", like).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User has already liked this travel entry");

    let (status, _) = app
        .json("POST", "/likes", json!({"userID": ana, "history_id": history_id + 50}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get(&format!("/likes/{}", history_id)).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn shared_trip_is_visible_only_after_acceptance() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    let ben = app.signup("ben").await;
    let (_, body) = app.add_trip(ana, "Paris", &[png("eiffel.jpg")]).await;
    let paris = body["historyId"].as_i64().unwrap();

    let search = format!("/search-travel-history?area_name=PARIS&userID={}", ben);
    let (_, body) = app.get(&search).await;
    assert!(body["travels"].as_array().unwrap().is_empty());

    let (status, body) = app
        .json(
            "POST",
            "/connections",
            json!({"requesterID": ana, "receiverID": ben, "history_id": paris}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["connection"]["Connections_status"], "pending");
    let connection_id = body["connection"]["connection_id"].as_i64().unwrap();

    let (_, body) = app.get(&search).await;
    assert!(body["travels"].as_array().unwrap().is_empty());

    let accept = format!("/connections/{}/accept", connection_id);
    let (status, _) = app.json("PUT", &accept, json!({"userID": ana})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.json("PUT", &accept, json!({"userID": ben})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&search).await;
    let travels = body["travels"].as_array().unwrap();
    assert_eq!(travels.len(), 1);
    assert_eq!(travels[0]["history_type"], "shared");
    assert_eq!(travels[0]["accountName"], "ana");
    assert_eq!(travels[0]["media"].as_array().unwrap().len(), 1);

    let (_, body) = app.get(&format!("/shared-history-details/{}", ben)).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["sharedHistories"][0]["other_accountName"], "ana");

    let (_, body) = app.get("/travel-history-by-country?area_name=paris").await;
    assert_eq!(body["travels"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .json(
            "POST",
            "/login",
            json!({"email": "ben@example.com", "password": "correct horse"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["citiesVisited"], 1);
}

#[tokio::test]
async fn search_requires_area_and_user() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/search-travel-history?area_name=Paris").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/travel-history-by-country?area_name=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn goals_crud_and_dashboard() {
    let app = TestApp::new().await;
    let ana = app.signup("ana").await;
    app.add_trip(ana, "Lisbon", &[]).await;

    for (title, date) in [("Japan", "2031-01-01"), ("Peru", "2030-06-01")] {
        let (status, _) = app
            .json(
                "POST",
                "/future-goals",
                json!({"userID": ana, "title": title, "target_date": date}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app
        .json(
            "POST",
            "/future-goals",
            json!({"userID": ana, "title": "Soon", "target_date": "next week"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&format!("/future-goals/{}", ana)).await;
    let goals = body["goals"].as_array().unwrap();
    assert_eq!(goals[0]["title"], "Peru");
    let peru = goals[0]["future_goal_id"].as_i64().unwrap();

    let (status, _) = app
        .json(
            "PUT",
            &format!("/future-goals/{}", peru),
            json!({"title": "Peru and Bolivia", "target_date": "2030-07-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .json(
            "PUT",
            "/future-goals/999",
            json!({"title": "x", "target_date": "2030-07-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get(&format!("/dashboard/{}", ana)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["citiesVisited"], 1);
    assert_eq!(body["stats"]["lastTrip"], "Lisbon");
    assert_eq!(body["recentTrips"].as_array().unwrap().len(), 1);
    assert_eq!(body["upcomingGoals"][0]["title"], "Peru and Bolivia");

    let uri = format!("/future-goals/{}", peru);
    let (status, _) = app.send(Request::delete(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Request::delete(uri.as_str()).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_for_unknown_user_has_defaults() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/dashboard/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["lastTrip"], "Never");
    assert!(body["recentTrips"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn upload_serving_falls_back_to_stem_prefix() {
    let app = TestApp::new().await;
    std::fs::write(app.uploads_dir().join("1700000000000-abcdefghi.png"), b"png").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/uploads/1700000000000-ABCDEFGHI.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

    let (status, _) = app.get("/test-image/1700000000000-ABCDEFGHI.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/uploads/missing.jpg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/uploads/..%2Fdb%2Froamlog.db").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/list-uploads").await;
    assert_eq!(body["filesAvailable"][0], "1700000000000-abcdefghi.png");
    let (_, body) = app.get("/uploaded-files").await;
    assert_eq!(body["files"][0]["size"], 3);
    assert_eq!(body["files"][0]["url"], "/uploads/1700000000000-abcdefghi.png");
}

#[tokio::test]
async fn lost_database_answers_503() {
    let app = TestApp::new().await;
    app.pool.close();
    std::fs::remove_dir_all(app.dir.path().join("db")).unwrap();

    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/list-uploads").await;
    assert_eq!(status, StatusCode::OK);

    std::fs::create_dir(app.dir.path().join("db")).unwrap();
    let (status, _) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
}
