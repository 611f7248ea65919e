//! Handler tests for the Events domain
//!
//! Every `/events` endpoint is driven through the router with in-memory
//! repositories, checking status codes, headers and response bodies.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use domain_events::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::time::Duration as StdDuration;
use test_utils::TestDataBuilder;
use tower::ServiceExt; // For oneshot()

const UID: &str = "firebase-uid-1";

fn app() -> Router {
    let service = EventService::new(InMemoryEventRepository::new(), InMemoryTaskRepository::new());
    Router::new().nest(
        "/events",
        handlers::router(service, LinkBuilder::default()),
    )
}

struct Req {
    method: &'static str,
    uri: String,
    uid: Option<&'static str>,
    if_match: Option<String>,
    prefer: Option<&'static str>,
    body: Option<Value>,
}

impl Req {
    fn new(method: &'static str, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            uid: Some(UID),
            if_match: None,
            prefer: None,
            body: None,
        }
    }

    fn anonymous(mut self) -> Self {
        self.uid = None;
        self
    }

    fn if_match(mut self, tag: impl Into<String>) -> Self {
        self.if_match = Some(tag.into());
        self
    }

    fn prefer(mut self, value: &'static str) -> Self {
        self.prefer = Some(value);
        self
    }

    fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(uid) = self.uid {
            builder = builder.header("x-firebase-uid", uid);
        }
        if let Some(tag) = self.if_match {
            builder = builder.header(header::IF_MATCH, tag);
        }
        if let Some(prefer) = self.prefer {
            builder = builder.header("prefer", prefer);
        }
        match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}

async fn send(app: &Router, req: Req) -> Response<Body> {
    app.clone().oneshot(req.build()).await.unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str(response: &Response<Body>, name: header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header"))
        .to_str()
        .unwrap()
        .to_string()
}

fn event_body(title: &str, start: DateTime<Utc>) -> Value {
    json!({
        "title": title,
        "description": "Quarterly planning",
        "location": "Room 101",
        "start_time": start,
        "end_time": start + Duration::hours(2),
    })
}

/// Create an event and return `(body, etag header)`
async fn create(app: &Router, title: &str, start: DateTime<Utc>) -> (Value, String) {
    let response = send(app, Req::new("POST", "/events").json(event_body(title, start))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let etag = header_str(&response, header::ETAG);
    (json_body(response).await, etag)
}

fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_missing_identity_is_unauthorized_before_anything_else() {
    let app = app();

    // Invalid body and invalid UUID would both be 400, identity wins
    let response = send(
        &app,
        Req::new("POST", "/events").anonymous().json(json!({"title": ""})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "UNAUTHORIZED");

    let response = send(&app, Req::new("GET", "/events/not-a-uuid").anonymous()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, Req::new("GET", "/events").anonymous()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Create / get
// ============================================================================

#[tokio::test]
async fn test_create_returns_201_with_location_and_etag() {
    let app = app();
    let start = tomorrow();

    let mut body = event_body("Planning", start);
    body["created_by"] = json!("someone-else");

    let response = send(&app, Req::new("POST", "/events").json(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let location = header_str(&response, header::LOCATION);
    let etag = header_str(&response, header::ETAG);
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(location, format!("/events/{id}"));
    assert_eq!(created["title"], "Planning");
    assert_eq!(created["location"], "Room 101");
    assert_eq!(created["created_by"], UID);
    assert_eq!(created["etag"], etag);
    assert_eq!(created["links"]["self"]["href"], location);
    assert_eq!(
        created["links"]["interests"]["href"],
        format!("/events/{id}/interests")
    );
    assert_eq!(created["links"]["collection"]["href"], "/events");

    let response = send(&app, Req::new("GET", location)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::ETAG), etag);

    let fetched = json_body(response).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_validation_errors() {
    let app = app();
    let start = tomorrow();

    let mut inverted = event_body("Inverted", start);
    inverted["end_time"] = json!(start - Duration::minutes(5));
    let response = send(&app, Req::new("POST", "/events").json(inverted)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");

    let response = send(&app, Req::new("POST", "/events").json(event_body("", start))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut long_location = event_body("Long", start);
    long_location["location"] = json!("x".repeat(256));
    let response = send(&app, Req::new("POST", "/events").json(long_location)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/events")
        .header("x-firebase-uid", UID)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.clone().oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "JSON_EXTRACTION");
}

#[tokio::test]
async fn test_get_invalid_uuid_and_missing_event() {
    let app = app();

    let response = send(&app, Req::new("GET", "/events/not-a-uuid")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "INVALID_UUID");

    let response = send(
        &app,
        Req::new("GET", format!("/events/{}", uuid::Uuid::now_v7())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "NOT_FOUND");
}

// ============================================================================
// Optimistic concurrency
// ============================================================================

#[tokio::test]
async fn test_patch_requires_if_match() {
    let app = app();
    let (created, _) = create(&app, "Patch me", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());

    let response = send(&app, Req::new("PATCH", &uri).json(json!({"title": "x"}))).await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(json_body(response).await["error"], "PRECONDITION_FAILED");
}

#[tokio::test]
async fn test_patch_with_current_then_stale_etag() {
    let app = app();
    let (created, etag) = create(&app, "Before", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());

    let response = send(
        &app,
        Req::new("PATCH", &uri)
            .if_match(etag.clone())
            .json(json!({"title": "After", "description": null})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let new_etag = header_str(&response, header::ETAG);
    assert_ne!(new_etag, etag);

    let patched = json_body(response).await;
    assert_eq!(patched["title"], "After");
    assert_eq!(patched["description"], Value::Null);
    assert_eq!(patched["location"], "Room 101");

    // Reusing the old tag loses the race
    let response = send(
        &app,
        Req::new("PATCH", &uri)
            .if_match(etag)
            .json(json!({"title": "Lost update"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "CONFLICT");

    // Weak form of the current tag is accepted
    let response = send(
        &app,
        Req::new("PATCH", &uri)
            .if_match(format!("W/{new_etag}"))
            .json(json!({"location": "Room 202"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_if_match_wildcard_matches_existing_event() {
    let app = app();
    let (created, etag) = create(&app, "Wildcard", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());

    let response = send(
        &app,
        Req::new("PATCH", &uri)
            .if_match("*")
            .json(json!({"title": "Any version"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(header_str(&response, header::ETAG), etag);

    let response = send(&app, Req::new("DELETE", &uri).if_match("*")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Nothing current to match
    let response = send(&app, Req::new("DELETE", &uri).if_match("*")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_rechecks_merged_window() {
    let app = app();
    let (created, etag) = create(&app, "Window", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());
    let end: DateTime<Utc> = serde_json::from_value(created["end_time"].clone()).unwrap();

    let response = send(
        &app,
        Req::new("PATCH", &uri)
            .if_match(etag)
            .json(json!({"start_time": end + Duration::hours(1)})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replace_event() {
    let app = app();
    let (created, etag) = create(&app, "Original", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());
    let start = tomorrow() + Duration::days(7);

    let replacement = json!({
        "title": "Replaced",
        "start_time": start,
        "end_time": start + Duration::hours(1),
    });

    let response = send(&app, Req::new("PUT", &uri).json(replacement.clone())).await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = send(&app, Req::new("PUT", &uri).if_match(etag).json(replacement)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let replaced = json_body(response).await;
    assert_eq!(replaced["title"], "Replaced");
    assert_eq!(replaced["description"], Value::Null);
    assert_eq!(replaced["location"], Value::Null);
    assert_eq!(replaced["created_by"], UID);
    assert_eq!(replaced["created_at"], created["created_at"]);
}

#[tokio::test]
async fn test_replace_missing_event_is_not_found() {
    let app = app();
    let start = tomorrow();
    let response = send(
        &app,
        Req::new("PUT", format!("/events/{}", uuid::Uuid::now_v7()))
            .if_match("\"anything\"")
            .json(event_body("Ghost", start)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sub_microsecond_window_rejected() {
    let app = app();
    let body = json!({
        "title": "Blink",
        "start_time": "2030-01-01T10:00:00.1234567Z",
        "end_time": "2030-01-01T10:00:00.1234569Z",
    });

    let response = send(&app, Req::new("POST", "/events").json(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_event_times_returned_at_microseconds() {
    let app = app();
    let body = json!({
        "title": "Precise",
        "start_time": "2030-01-01T10:00:00.1234567Z",
        "end_time": "2030-01-01T11:00:00.9999999Z",
    });

    let response = send(&app, Req::new("POST", "/events").json(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let start: DateTime<Utc> = serde_json::from_value(created["start_time"].clone()).unwrap();
    let end: DateTime<Utc> = serde_json::from_value(created["end_time"].clone()).unwrap();
    assert_eq!(start, "2030-01-01T10:00:00.123456Z".parse::<DateTime<Utc>>().unwrap());
    assert_eq!(end, "2030-01-01T11:00:00.999999Z".parse::<DateTime<Utc>>().unwrap());
}

#[tokio::test]
async fn test_delete_event() {
    let app = app();
    let (created, etag) = create(&app, "Doomed", tomorrow()).await;
    let uri = format!("/events/{}", created["id"].as_str().unwrap());

    let response = send(&app, Req::new("DELETE", &uri)).await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = send(&app, Req::new("DELETE", &uri).if_match("\"stale\"")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, Req::new("DELETE", &uri).if_match(etag)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Req::new("GET", &uri)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_paginates_in_start_order() {
    let app = app();
    let base = tomorrow();
    for i in 0..15 {
        create(&app, &format!("event-{i:02}"), base + Duration::hours(15 - i)).await;
    }

    let response = send(&app, Req::new("GET", "/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["total"], 15);
    assert_eq!(page["skip"], 0);
    assert_eq!(page["limit"], 10);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["title"], "event-14");
    assert!(items[0]["etag"].is_string());
    assert_eq!(page["links"]["next"]["href"], "/events?skip=10&limit=10");
    assert!(page["links"].get("prev").is_none());

    let response = send(&app, Req::new("GET", "/events?skip=10&limit=10")).await;
    let page = json_body(response).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 5);
    assert!(page["links"].get("next").is_none());
    assert_eq!(page["links"]["prev"]["href"], "/events?skip=0&limit=10");
}

#[tokio::test]
async fn test_list_rejects_bad_limits() {
    let app = app();
    for uri in ["/events?limit=0", "/events?limit=101", "/events?skip=-1", "/events?limit=ten"] {
        let response = send(&app, Req::new("GET", uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_list_rejects_skip_past_bigint() {
    let app = app();
    create(&app, "Only", tomorrow()).await;

    let response = send(&app, Req::new("GET", "/events?skip=9223372036854775807")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["total"], 1);
    assert!(page["items"].as_array().unwrap().is_empty());

    for skip in ["9223372036854775808", "18446744073709551615"] {
        let uri = format!("/events?skip={skip}");
        let response = send(&app, Req::new("GET", &uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json_body(response).await["error"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_list_filters() {
    let app = app();
    let base = tomorrow();
    create(&app, "Rust Meetup", base).await;
    create(&app, "Go Meetup", base + Duration::days(2)).await;
    create(&app, "Board review", base + Duration::days(4)).await;

    let response = send(&app, Req::new("GET", "/events?search=meetup")).await;
    let page = json_body(response).await;
    assert_eq!(page["total"], 2);
    assert!(page["links"]["self"]["href"].as_str().unwrap().contains("search=meetup"));

    let starts_after = urlencoding::encode(&(base + Duration::days(1)).to_rfc3339()).into_owned();
    let response = send(
        &app,
        Req::new("GET", format!("/events?starts_after={starts_after}")),
    )
    .await;
    assert_eq!(json_body(response).await["total"], 2);

    let response = send(&app, Req::new("GET", format!("/events?created_by={UID}"))).await;
    assert_eq!(json_body(response).await["total"], 3);

    let response = send(&app, Req::new("GET", "/events?created_by=nobody")).await;
    assert_eq!(json_body(response).await["total"], 0);
}

// ============================================================================
// Interests
// ============================================================================

#[tokio::test]
async fn test_interest_lifecycle() {
    let app = app();
    let builder = TestDataBuilder::from_test_name("handler_interest_lifecycle");
    let interest_id = builder.interest_id(1);

    let (tagged, etag) = create(&app, "Tagged", tomorrow()).await;
    create(&app, "Untagged", tomorrow()).await;
    let event_id = tagged["id"].as_str().unwrap();
    let interests_uri = format!("/events/{event_id}/interests");

    let response = send(
        &app,
        Req::new("POST", &interests_uri).json(json!({"interest_id": interest_id})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["event_id"], event_id);
    assert_eq!(
        body["links"]["self"]["href"],
        format!("/events/{event_id}/interests/{interest_id}")
    );
    assert_eq!(body["links"]["event"]["href"], format!("/events/{event_id}"));

    // Second add is idempotent
    let response = send(
        &app,
        Req::new("POST", &interests_uri).json(json!({"interest_id": interest_id})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Req::new("GET", &interests_uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    let response = send(
        &app,
        Req::new("GET", format!("/events?interest_id={interest_id}")),
    )
    .await;
    let page = json_body(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], event_id);

    let association = format!("{interests_uri}/{interest_id}");
    let response = send(&app, Req::new("DELETE", &association)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, Req::new("DELETE", &association)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Associations do not change the event tag
    let response = send(&app, Req::new("GET", format!("/events/{event_id}"))).await;
    assert_eq!(header_str(&response, header::ETAG), etag);
}

#[tokio::test]
async fn test_interests_on_missing_event() {
    let app = app();
    let missing = uuid::Uuid::now_v7();

    let response = send(&app, Req::new("GET", format!("/events/{missing}/interests"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Req::new("POST", format!("/events/{missing}/interests"))
            .json(json!({"interest_id": uuid::Uuid::now_v7()})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Req::new("POST", format!("/events/{missing}/interests")).json(json!({"interest_id": "nope"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_event_removes_interests() {
    let app = app();
    let interest_id = TestDataBuilder::from_test_name("handler_cascade").interest_id(1);
    let (created, etag) = create(&app, "Cascade", tomorrow()).await;
    let event_id = created["id"].as_str().unwrap();

    send(
        &app,
        Req::new("POST", format!("/events/{event_id}/interests"))
            .json(json!({"interest_id": interest_id})),
    )
    .await;

    let response = send(
        &app,
        Req::new("DELETE", format!("/events/{event_id}")).if_match(etag),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &app,
        Req::new("GET", format!("/events?interest_id={interest_id}")),
    )
    .await;
    assert_eq!(json_body(response).await["total"], 0);
}

// ============================================================================
// Asynchronous create
// ============================================================================

async fn poll_task(app: &Router, location: &str) -> Value {
    for _ in 0..100 {
        let response = send(app, Req::new("GET", location)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let task = json_body(response).await;
        if task["status"] == "completed" || task["status"] == "failed" {
            return task;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("task at {location} never finished");
}

#[tokio::test]
async fn test_async_create_via_query() {
    let app = app();

    let response = send(
        &app,
        Req::new("POST", "/events?async=true").json(event_body("Later", tomorrow())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = header_str(&response, header::LOCATION);
    let accepted = json_body(response).await;
    let task_id = accepted["id"].as_str().unwrap();
    assert_eq!(location, format!("/events/tasks/{task_id}"));
    assert!(accepted["links"].get("event").is_none());

    let task = poll_task(&app, &location).await;
    assert_eq!(task["status"], "completed");
    assert!(task["completed_at"].is_string());
    assert_eq!(task["result"]["title"], "Later");

    let event_href = task["links"]["event"]["href"].as_str().unwrap().to_string();
    let response = send(&app, Req::new("GET", event_href)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["created_by"], UID);
}

#[tokio::test]
async fn test_async_create_via_prefer_header() {
    let app = app();

    let response = send(
        &app,
        Req::new("POST", "/events")
            .prefer("respond-async")
            .json(event_body("Preferred", tomorrow())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = header_str(&response, header::LOCATION);
    assert_eq!(poll_task(&app, &location).await["status"], "completed");
}

#[tokio::test]
async fn test_async_create_validates_synchronously() {
    let app = app();

    let response = send(
        &app,
        Req::new("POST", "/events?async=true").json(event_body("", tomorrow())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let app = app();
    let response = send(
        &app,
        Req::new("GET", format!("/events/tasks/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
