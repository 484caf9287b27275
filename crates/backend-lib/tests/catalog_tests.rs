mod common;

use axum::http::StatusCode;
use backend_lib::mail::MemoryMailer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{
    body_json, delete, get, json_request, multipart_request, png, setup, setup_with,
    BrokenTelemetry,
};
use serde_json::json;

#[tokio::test]
async fn test_catalog_requires_session() {
    let app = setup();
    let response = app.send(get("/instruments", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(get("/storage-locations", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_with_photo_and_edit_keeps_it() {
    let app = setup();
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Caliper"), ("description", "digital")],
            Some(png(2000, 1000).as_slice()),
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_i64().unwrap();

    let photo = STANDARD.decode(created["photo"].as_str().unwrap()).unwrap();
    assert!(photo.len() <= 50 * 1024);
    let decoded = image::load_from_memory(&photo).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 200));

    // Empty file part means no new photo
    let response = app
        .send(multipart_request(
            "POST",
            &format!("/instruments/{id}"),
            &[("name", "Caliper"), ("description", "0.01 mm")],
            Some(&[][..]),
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["description"], "0.01 mm");
    assert_eq!(updated["photo"], created["photo"]);

    let response = app.send(get(&format!("/instruments/{id}"), Some(&cookie))).await;
    assert_eq!(body_json(response).await["photo"], created["photo"]);
}

#[tokio::test]
async fn test_create_without_photo() {
    let app = setup();
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Level")],
            None,
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert!(created["photo"].is_null());
    assert_eq!(created["description"], "");
}

#[tokio::test]
async fn test_invalid_uploads_rejected() {
    let app = setup();
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Saw")],
            Some(&b"not an image"[..]),
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["code"], "IMG_001");

    let response = app
        .send(multipart_request("POST", "/instruments", &[("name", "  ")], None, &cookie))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Saw"), ("storage_location", "99")],
            None,
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_other_users_instruments_are_not_found() {
    let app = setup();
    let alice = app.signed_in("alice", "a@x.com").await;
    let bob = app.signed_in("bob", "b@x.com").await;

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Chisel")],
            None,
            &alice,
        ))
        .await;
    let id = body_json(response).await["id"].as_i64().unwrap();

    let response = app.send(get(&format!("/instruments/{id}"), Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(multipart_request(
            "POST",
            &format!("/instruments/{id}"),
            &[("name", "Mine now")],
            None,
            &bob,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(delete(&format!("/instruments/{id}"), &bob)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(get("/instruments", Some(&bob))).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = app.send(delete(&format!("/instruments/{id}"), &alice)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.send(get("/instruments", Some(&alice))).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_locations() {
    let app = setup();
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/storage-locations",
            json!({"name": "Shelf A"}),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location_id = body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .send(json_request(
            "POST",
            &format!("/storage-locations/{location_id}"),
            json!({"name": "Shelf B"}),
            Some(&cookie),
        ))
        .await;
    assert_eq!(body_json(response).await["name"], "Shelf B");

    let location = location_id.to_string();
    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Hammer"), ("storage_location", location.as_str())],
            None,
            &cookie,
        ))
        .await;
    let instrument = body_json(response).await;
    assert_eq!(instrument["storage_location"], "Shelf B");
    let instrument_id = instrument["id"].as_i64().unwrap();

    let response = app
        .send(delete(&format!("/storage-locations/{location_id}"), &cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get(&format!("/instruments/{instrument_id}"), Some(&cookie)))
        .await;
    let instrument = body_json(response).await;
    assert!(instrument["storage_location_id"].is_null());
    assert!(instrument["storage_location"].is_null());

    let response = app.send(get("/storage-locations", Some(&cookie))).await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = app
        .send(delete(&format!("/storage-locations/{location_id}"), &cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_telemetry_failure_does_not_fail_request() {
    let app = setup_with(BrokenTelemetry::default(), MemoryMailer::new());
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app.send(get("/instruments", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(multipart_request(
            "POST",
            "/instruments",
            &[("name", "Vise")],
            None,
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_requests_record_cookie_telemetry() {
    let app = setup();
    let cookie = app.signed_in("alice", "a@x.com").await;

    let response = app.send(get("/instruments", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut rows = app.state.storage.recorded_cookies();
    for _ in 0..50 {
        if !rows.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        rows = app.state.storage.recorded_cookies();
    }
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cookie_name, "toolroom_session");
    assert_eq!(rows[0].device, "Other");
    assert!(rows[0].country.is_none());
}
