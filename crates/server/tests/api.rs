use std::collections::HashMap;

use db::DBService;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use server::{AppState, build_router, config::Config};
use tempfile::TempDir;
use utils::tracking_id;

const ROOT_EMAIL: &str = "root@city.gov";
const ROOT_PASSWORD: &str = "root-password";
const GUEST_PASSWORD: &str = "open-sesame";

struct TestApp {
    base: String,
    client: Client,
    _uploads: TempDir,
}

async fn spawn_app(guest: bool) -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let mut vars: HashMap<&str, String> = HashMap::from([
        ("JWT_SECRET", "integration-secret".to_string()),
        ("UPLOAD_DIR", uploads.path().display().to_string()),
        ("MAX_UPLOAD_BYTES", "1024".to_string()),
        ("ESCALATION_HOURS", "0".to_string()),
    ]);
    if guest {
        vars.insert("GUEST_PASSWORD", GUEST_PASSWORD.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("config");

    let db = DBService::new_in_memory().await.expect("db");
    let state = AppState::new(config, db);
    state
        .auth
        .seed_super_admin(ROOT_EMAIL, ROOT_PASSWORD)
        .await
        .expect("seed admin");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("serve");
    });

    TestApp {
        base: format!("http://{addr}"),
        client: Client::new(),
        _uploads: uploads,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn login(&self) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": ROOT_EMAIL, "password": ROOT_PASSWORD }))
            .send()
            .await
            .expect("login")
            .json()
            .await
            .expect("login body");
        body["data"]["token"].as_str().expect("token").to_string()
    }

    async fn submit(&self, description: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/reports"))
            .json(&json!({
                "description": description,
                "location": { "latitude": 12.97, "longitude": 77.59, "address": "MG Road" },
                "reporter_contact": "citizen@example.org",
            }))
            .send()
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("submit body");
        body["data"].clone()
    }

    async fn create_team(&self, token: &str, name: &str, capacity: i64) -> Value {
        let response = self
            .client
            .post(self.url("/api/teams"))
            .bearer_auth(token)
            .json(&json!({ "name": name, "capacity": capacity }))
            .send()
            .await
            .expect("create team");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("team body");
        body["data"].clone()
    }
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = spawn_app(false).await;
    let body: Value = app
        .client
        .get(app.url("/api/health"))
        .send()
        .await
        .expect("health")
        .json()
        .await
        .expect("health body");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn submitted_report_can_be_tracked_publicly() {
    let app = spawn_app(false).await;
    let report = app.submit("Deep pothole on MG Road").await;
    let tracking = report["tracking_id"].as_str().expect("tracking id");
    assert!(tracking_id::is_valid(tracking), "{tracking}");
    assert_eq!(report["status"], "submitted");
    assert_eq!(report["category"], "pothole");

    let response = app
        .client
        .get(app.url(&format!("/api/reports/{tracking}/track")))
        .send()
        .await
        .expect("track");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("track body");
    assert_eq!(body["data"]["tracking_id"], tracking);
    assert!(body["data"].get("reporter_contact").is_none());
    assert_eq!(body["data"]["updates"][0]["action"], "created");

    let missing = app
        .client
        .get(app.url("/api/reports/RPT-20000101-0001/track"))
        .send()
        .await
        .expect("track missing");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.expect("error body");
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let app = spawn_app(false).await;
    let response = app
        .client
        .post(app.url("/api/reports"))
        .json(&json!({ "description": "   " }))
        .send()
        .await
        .expect("submit");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_endpoints_require_an_admin_token() {
    let app = spawn_app(true).await;

    let anonymous = app
        .client
        .get(app.url("/api/admin/reports"))
        .send()
        .await
        .expect("anonymous");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let bogus = app
        .client
        .get(app.url("/api/admin/reports"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("bogus");
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);

    let guest: Value = app
        .client
        .post(app.url("/api/auth/guest"))
        .json(&json!({ "password": GUEST_PASSWORD }))
        .send()
        .await
        .expect("guest login")
        .json()
        .await
        .expect("guest body");
    let guest_token = guest["data"]["token"].as_str().expect("guest token");

    let forbidden = app
        .client
        .get(app.url("/api/admin/reports"))
        .bearer_auth(guest_token)
        .send()
        .await
        .expect("guest admin call");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    app.submit("Streetlight flickering").await;
    let feed = app
        .client
        .get(app.url("/api/reports"))
        .bearer_auth(guest_token)
        .send()
        .await
        .expect("guest feed");
    assert_eq!(feed.status(), StatusCode::OK);
    let body: Value = feed.json().await.expect("feed body");
    assert_eq!(body["data"]["total"], 1);
    assert!(body["data"]["items"][0].get("reporter_contact").is_none());

    let admin_token = app.login().await;
    let listed = app
        .client
        .get(app.url("/api/admin/reports?category=streetlight&limit=5"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .expect("admin list");
    assert_eq!(listed.status(), StatusCode::OK);
    let body: Value = listed.json().await.expect("admin body");
    assert_eq!(body["data"]["items"][0]["reporter_contact"], "citizen@example.org");
}

#[tokio::test]
async fn guest_login_is_forbidden_when_disabled() {
    let app = spawn_app(false).await;
    let response = app
        .client
        .post(app.url("/api/auth/guest"))
        .json(&json!({ "password": "anything" }))
        .send()
        .await
        .expect("guest login");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let wrong = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": ROOT_EMAIL, "password": "wrong" }))
        .send()
        .await
        .expect("bad login");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn assignment_respects_team_capacity() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let team = app.create_team(&token, "Roads", 1).await;
    let first = app.submit("Pothole by the bakery").await;
    let second = app.submit("Pothole by the bank").await;

    let assign = |report: &Value| {
        app.client
            .post(app.url(&format!(
                "/api/reports/{}/assign",
                report["tracking_id"].as_str().expect("tracking id")
            )))
            .bearer_auth(&token)
            .json(&json!({ "team_id": team["id"] }))
            .send()
    };

    let ok = assign(&first).await.expect("assign first");
    assert_eq!(ok.status(), StatusCode::OK);
    let body: Value = ok.json().await.expect("assign body");
    assert_eq!(body["data"]["status"], "assigned");

    let full = assign(&second).await.expect("assign second");
    assert_eq!(full.status(), StatusCode::CONFLICT);
    let body: Value = full.json().await.expect("conflict body");
    assert_eq!(body["success"], false);

    let team_path = format!("/api/teams/{}", team["id"].as_str().expect("team id"));
    let team_now: Value = app
        .client
        .get(app.url(&team_path))
        .bearer_auth(&token)
        .send()
        .await
        .expect("team")
        .json()
        .await
        .expect("team body");
    assert_eq!(team_now["data"]["current_load"], 1);
    assert_eq!(team_now["data"]["available_slots"], 0);

    let busy = app
        .client
        .delete(app.url(&team_path))
        .bearer_auth(&token)
        .send()
        .await
        .expect("delete team");
    assert_eq!(busy.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_endpoint_enforces_transitions() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let report = app.submit("Garbage piling up").await;
    let path = format!("/api/reports/{}/status", report["id"].as_str().expect("id"));

    let skip = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "status": "resolved" }))
        .send()
        .await
        .expect("skip ahead");
    assert_eq!(skip.status(), StatusCode::BAD_REQUEST);

    let ack = app
        .client
        .patch(app.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "status": "acknowledged", "note": "seen" }))
        .send()
        .await
        .expect("acknowledge");
    assert_eq!(ack.status(), StatusCode::OK);

    let details: Value = app
        .client
        .get(app.url(&format!("/api/reports/{}", report["tracking_id"].as_str().expect("tid"))))
        .bearer_auth(&token)
        .send()
        .await
        .expect("details")
        .json()
        .await
        .expect("details body");
    assert_eq!(details["data"]["status"], "acknowledged");
    assert_eq!(details["data"]["updates"].as_array().expect("updates").len(), 2);
    assert_eq!(details["data"]["updates"][1]["actor"], ROOT_EMAIL);
}

#[tokio::test]
async fn uploads_are_validated_and_served() {
    let app = spawn_app(false).await;
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    let form = Form::new().part(
        "file",
        Part::bytes(png.clone())
            .file_name("photo.png")
            .mime_str("image/png")
            .expect("mime"),
    );
    let response = app
        .client
        .post(app.url("/api/uploads"))
        .multipart(form)
        .send()
        .await
        .expect("upload");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("upload body");
    let url = body["data"]["url"].as_str().expect("url").to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));

    let served = app.client.get(app.url(&url)).send().await.expect("fetch");
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await.expect("bytes").to_vec(), png);

    let text = Form::new().part(
        "file",
        Part::bytes(b"hello".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .expect("mime"),
    );
    let unsupported = app
        .client
        .post(app.url("/api/uploads"))
        .multipart(text)
        .send()
        .await
        .expect("upload text");
    assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let big = Form::new().part(
        "file",
        Part::bytes(vec![0u8; 2048])
            .file_name("huge.jpg")
            .mime_str("image/jpeg")
            .expect("mime"),
    );
    let too_large = app
        .client
        .post(app.url("/api/uploads"))
        .multipart(big)
        .send()
        .await
        .expect("upload big");
    assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_requests_use_the_error_envelope() {
    let app = spawn_app(false).await;
    let token = app.login().await;

    let missing_fields = app
        .client
        .post(app.url("/api/reports"))
        .json(&json!({}))
        .send()
        .await
        .expect("submit");
    assert_eq!(missing_fields.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing_fields.json().await.expect("error body");
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    let bad_filter = app
        .client
        .get(app.url("/api/admin/reports?status=bogus"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("bad filter");
    assert_eq!(bad_filter.status(), StatusCode::BAD_REQUEST);
    let body: Value = bad_filter.json().await.expect("error body");
    assert_eq!(body["success"], false);

    let bad_team_id = app
        .client
        .get(app.url("/api/teams/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("bad team id");
    assert_eq!(bad_team_id.status(), StatusCode::BAD_REQUEST);
    let body: Value = bad_team_id.json().await.expect("error body");
    assert_eq!(body["success"], false);

    let far_page = app
        .client
        .get(app.url("/api/admin/reports?page=9223372036854775807"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("far page");
    assert_eq!(far_page.status(), StatusCode::OK);
    let body: Value = far_page.json().await.expect("page body");
    assert_eq!(body["data"]["items"].as_array().expect("items").len(), 0);
}

#[tokio::test]
async fn report_management_endpoints() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let team = app.create_team(&token, "Roads", 2).await;
    let report = app.submit("Pothole near the school").await;
    let tracking = report["tracking_id"].as_str().expect("tracking id");
    let path = |suffix: &str| app.url(&format!("/api/reports/{tracking}{suffix}"));

    let priority = app
        .client
        .patch(path("/priority"))
        .bearer_auth(&token)
        .json(&json!({ "priority": "critical", "note": "school zone" }))
        .send()
        .await
        .expect("priority");
    assert_eq!(priority.status(), StatusCode::OK);
    let body: Value = priority.json().await.expect("priority body");
    assert_eq!(body["data"]["priority"], "critical");

    let same = app
        .client
        .patch(path("/priority"))
        .bearer_auth(&token)
        .json(&json!({ "priority": "critical" }))
        .send()
        .await
        .expect("same priority");
    assert_eq!(same.status(), StatusCode::BAD_REQUEST);

    let note = app
        .client
        .post(path("/notes"))
        .bearer_auth(&token)
        .json(&json!({ "note": "crew informed" }))
        .send()
        .await
        .expect("note");
    assert_eq!(note.status(), StatusCode::CREATED);
    let body: Value = note.json().await.expect("note body");
    assert_eq!(body["data"]["note"], "crew informed");

    let assigned = app
        .client
        .post(path("/assign"))
        .bearer_auth(&token)
        .json(&json!({ "team_id": team["id"] }))
        .send()
        .await
        .expect("assign");
    assert_eq!(assigned.status(), StatusCode::OK);

    // no body and no content type
    let unassigned = app
        .client
        .post(path("/unassign"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("unassign");
    assert_eq!(unassigned.status(), StatusCode::OK);
    let body: Value = unassigned.json().await.expect("unassign body");
    assert_eq!(body["data"]["status"], "acknowledged");
    assert!(body["data"]["assigned_to"].is_null());

    let team_path = format!("/api/teams/{}", team["id"].as_str().expect("team id"));
    let team_now: Value = app
        .client
        .get(app.url(&team_path))
        .bearer_auth(&token)
        .send()
        .await
        .expect("team")
        .json()
        .await
        .expect("team body");
    assert_eq!(team_now["data"]["current_load"], 0);

    let deleted = app
        .client
        .delete(path(""))
        .bearer_auth(&token)
        .send()
        .await
        .expect("delete");
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .client
        .get(path(""))
        .bearer_auth(&token)
        .send()
        .await
        .expect("details after delete");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    let again = app
        .client
        .delete(path(""))
        .bearer_auth(&token)
        .send()
        .await
        .expect("delete again");
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn teams_can_be_updated() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let team = app.create_team(&token, "Parks", 1).await;
    let team_path = format!("/api/teams/{}", team["id"].as_str().expect("team id"));

    let updated = app
        .client
        .patch(app.url(&team_path))
        .bearer_auth(&token)
        .json(&json!({ "capacity": 4, "department": "Public Works" }))
        .send()
        .await
        .expect("update team");
    assert_eq!(updated.status(), StatusCode::OK);
    let body: Value = updated.json().await.expect("team body");
    assert_eq!(body["data"]["capacity"], 4);
    assert_eq!(body["data"]["department"], "Public Works");
    assert_eq!(body["data"]["name"], "Parks");

    let invalid = app
        .client
        .patch(app.url(&team_path))
        .bearer_auth(&token)
        .json(&json!({ "capacity": -1 }))
        .send()
        .await
        .expect("invalid update");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .client
        .patch(app.url(&format!("/api/teams/{}", uuid::Uuid::new_v4())))
        .bearer_auth(&token)
        .json(&json!({ "capacity": 2 }))
        .send()
        .await
        .expect("missing team");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_can_be_created_and_log_in() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let request = json!({
        "email": "clerk@city.gov",
        "name": "Clerk",
        "password": "clerk-password",
        "role": "staff",
    });

    let created = app
        .client
        .post(app.url("/api/admin/admins"))
        .bearer_auth(&token)
        .json(&request)
        .send()
        .await
        .expect("create admin");
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = created.json().await.expect("admin body");
    assert_eq!(body["data"]["role"], "staff");
    assert!(body["data"].get("password_hash").is_none());

    let duplicate = app
        .client
        .post(app.url("/api/admin/admins"))
        .bearer_auth(&token)
        .json(&request)
        .send()
        .await
        .expect("duplicate admin");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let login: Value = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "clerk@city.gov", "password": "clerk-password" }))
        .send()
        .await
        .expect("clerk login")
        .json()
        .await
        .expect("clerk login body");
    let clerk_token = login["data"]["token"].as_str().expect("clerk token");

    let forbidden = app
        .client
        .post(app.url("/api/admin/admins"))
        .bearer_auth(clerk_token)
        .json(&json!({
            "email": "other@city.gov",
            "name": "Other",
            "password": "other-password",
            "role": "staff",
        }))
        .send()
        .await
        .expect("staff creates admin");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn notification_log_records_assignment() {
    let app = spawn_app(false).await;
    let token = app.login().await;
    let team = app.create_team(&token, "Roads", 1).await;
    let report = app.submit("Pothole on the ring road").await;
    let tracking = report["tracking_id"].as_str().expect("tracking id");

    let assigned = app
        .client
        .post(app.url(&format!("/api/reports/{tracking}/assign")))
        .bearer_auth(&token)
        .json(&json!({ "team_id": team["id"] }))
        .send()
        .await
        .expect("assign");
    assert_eq!(assigned.status(), StatusCode::OK);

    // dispatch runs in the background
    let mut logs = Vec::new();
    for _ in 0..50 {
        let body: Value = app
            .client
            .get(app.url(&format!("/api/admin/notifications?report={tracking}")))
            .bearer_auth(&token)
            .send()
            .await
            .expect("notifications")
            .json()
            .await
            .expect("notifications body");
        logs = body["data"].as_array().expect("logs").clone();
        if logs
            .iter()
            .any(|log| log["event"] == "report_assigned" && log["recipient"] == "team:Roads")
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(
        logs.iter()
            .any(|log| log["event"] == "report_assigned" && log["recipient"] == "team:Roads"),
        "{logs:?}"
    );

    let unknown = app
        .client
        .get(app.url("/api/admin/notifications?report=RPT-20000101-0001"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("unknown report");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_endpoints() {
    let app = spawn_app(true).await;
    let token = app.login().await;
    app.create_team(&token, "Roads", 3).await;
    app.submit("Pothole on MG Road").await;
    app.submit("Garbage not collected").await;

    let get = |path: &'static str| {
        app.client
            .get(app.url(path))
            .bearer_auth(&token)
            .send()
    };

    let summary: Value = get("/api/analytics/summary")
        .await
        .expect("summary")
        .json()
        .await
        .expect("summary body");
    assert_eq!(summary["data"]["total"], 2);
    assert_eq!(summary["data"]["open"], 2);
    assert_eq!(summary["data"]["by_status"]["submitted"], 2);

    let trends: Value = get("/api/analytics/trends?days=7")
        .await
        .expect("trends")
        .json()
        .await
        .expect("trends body");
    let points = trends["data"].as_array().expect("points");
    assert_eq!(points.len(), 7);
    assert_eq!(points[6]["created"], 2);

    let heatmap: Value = get("/api/analytics/heatmap?precision=1")
        .await
        .expect("heatmap")
        .json()
        .await
        .expect("heatmap body");
    let cells = heatmap["data"].as_array().expect("cells");
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0]["count"], 2);

    let teams: Value = get("/api/analytics/teams")
        .await
        .expect("team performance")
        .json()
        .await
        .expect("team performance body");
    assert_eq!(teams["data"][0]["name"], "Roads");
    assert_eq!(teams["data"][0]["capacity"], 3);

    let guest: Value = app
        .client
        .post(app.url("/api/auth/guest"))
        .json(&json!({ "password": GUEST_PASSWORD }))
        .send()
        .await
        .expect("guest login")
        .json()
        .await
        .expect("guest body");
    let guest_token = guest["data"]["token"].as_str().expect("guest token");
    let forbidden = app
        .client
        .get(app.url("/api/analytics/summary"))
        .bearer_auth(guest_token)
        .send()
        .await
        .expect("guest analytics");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}
