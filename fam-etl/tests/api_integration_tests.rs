//! Integration tests for the fam-etl HTTP surface

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use fam_common::events::EventBus;
use fam_etl::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

/// Test helper: app over an in-memory database
async fn create_test_app() -> (axum::Router, sqlx::SqlitePool) {
    let pool = fam_etl::db::init_memory_pool()
        .await
        .expect("in-memory database");
    let state = AppState::new(pool.clone(), EventBus::new(100));
    (fam_etl::build_router(state), pool)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn health_reports_module_identity() {
    let (app, _pool) = create_test_app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "fam-etl");
}

#[tokio::test]
async fn rule_crud_round_trip() {
    let (app, _pool) = create_test_app().await;

    let (status, created) = send(
        &app,
        post_json(
            "/pipeline/rules",
            json!({
                "name": "trim manufacturer",
                "phase": "CLEAN",
                "kind": "TRIM",
                "target": "Manufacturer",
                "priority": 10
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().expect("rule id").to_string();

    let (status, listed) = send(&app, get("/pipeline/rules?phase=CLEAN")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["rules"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/pipeline/rules/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/pipeline/rules/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rule_mutation_is_routed_as_patch() {
    let (app, _pool) = create_test_app().await;

    let (_, created) = send(
        &app,
        post_json(
            "/pipeline/rules",
            json!({
                "name": "trim manufacturer",
                "phase": "CLEAN",
                "kind": "TRIM",
                "target": "Manufacturer",
                "priority": 10
            }),
        ),
    )
    .await;
    let id = created["id"].as_str().expect("rule id").to_string();

    let patch = Request::builder()
        .method("PATCH")
        .uri(format!("/pipeline/rules/{}", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "name": "trim text columns",
                "phase": "CLEAN",
                "kind": "TRIM",
                "target": "Manufacturer, Location",
                "priority": 5
            })
            .to_string(),
        ))
        .unwrap();
    let (status, updated) = send(&app, patch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], Value::String(id));
    assert_eq!(updated["name"], "trim text columns");
    assert_eq!(updated["priority"], 5);
}

#[tokio::test]
async fn rule_with_mismatched_kind_and_phase_is_rejected() {
    let (app, _pool) = create_test_app().await;
    let (status, body) = send(
        &app,
        post_json(
            "/pipeline/rules",
            json!({
                "name": "bad",
                "phase": "CLEAN",
                "kind": "DATE_FORMAT",
                "target": "Install Date",
                "config": {"to_format": "%Y-%m-%d"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn rule_with_invalid_regex_is_rejected_at_save_time() {
    let (app, _pool) = create_test_app().await;
    let (status, _) = send(
        &app,
        post_json(
            "/pipeline/rules",
            json!({
                "name": "broken pattern",
                "phase": "CLEAN",
                "kind": "REGEX_REPLACE",
                "target": "Manufacturer",
                "config": {"pattern": "([unclosed", "replacement": "x"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn alias_upsert_replaces_previous_mapping() {
    let (app, _pool) = create_test_app().await;

    let (status, _) = send(
        &app,
        post_json(
            "/pipeline/aliases",
            json!({"asset_field": "oldField", "csv_alias": "Asset ID", "confidence": 0.5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/pipeline/aliases",
            json!({"asset_field": "assetTag", "csv_alias": "Asset ID", "confidence": 1.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/pipeline/aliases")).await;
    let aliases = body["aliases"].as_array().unwrap();
    assert_eq!(aliases.len(), 1);
    assert_eq!(aliases[0]["asset_field"], "assetTag");
}

#[tokio::test]
async fn alias_confidence_out_of_range_is_rejected() {
    let (app, _pool) = create_test_app().await;
    let (status, _) = send(
        &app,
        post_json(
            "/pipeline/aliases",
            json!({"asset_field": "assetTag", "csv_alias": "Asset ID", "confidence": 1.5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn field_mappings_preview_reports_coverage() {
    let (app, _pool) = create_test_app().await;

    for (field, alias) in [("assetTag", "Asset ID"), ("status", "Status")] {
        send(
            &app,
            post_json(
                "/pipeline/aliases",
                json!({"asset_field": field, "csv_alias": alias, "confidence": 1.0}),
            ),
        )
        .await;
    }
    let (_, file) = send(
        &app,
        post_json(
            "/pipeline/files",
            json!({"filename": "assets.csv", "content": "Asset ID,Status,Unknown Col\nA-1,OK,x\n"}),
        ),
    )
    .await;
    let file_id = file["id"].as_str().unwrap();

    let (status, body) = send(&app, get(&format!("/pipeline/field-mappings?file={}", file_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["coverage_percent"], 67);
    assert_eq!(body["unmapped_fields"], json!(["Unknown Col"]));
}

#[tokio::test]
async fn test_orchestrator_dry_runs_the_fixture() {
    let (app, pool) = create_test_app().await;

    send(
        &app,
        post_json(
            "/pipeline/aliases",
            json!({"asset_field": "assetTag", "csv_alias": "Asset ID", "confidence": 1.0}),
        ),
    )
    .await;

    let (status, body) = send(&app, post_json("/pipeline/test-orchestrator", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["phases"].as_array().unwrap().len(), 6);
    assert_eq!(body["total_rows"], 1);

    // Dry runs persist nothing
    assert_eq!(fam_etl::db::assets::count_assets(&pool).await.unwrap(), 0);
    let (_, jobs) = send(&app, get("/pipeline/jobs")).await;
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn job_flow_uploads_runs_and_downloads_results() {
    let (app, pool) = create_test_app().await;

    for (field, alias) in [("assetTag", "Asset ID"), ("status", "Status")] {
        send(
            &app,
            post_json(
                "/pipeline/aliases",
                json!({"asset_field": field, "csv_alias": alias, "confidence": 1.0}),
            ),
        )
        .await;
    }
    let (_, file) = send(
        &app,
        post_json(
            "/pipeline/files",
            json!({"filename": "assets.csv", "content": "Asset ID,Status\nA-1,OK\nA-2,OK\n"}),
        ),
    )
    .await;
    let file_id = file["id"].as_str().unwrap().to_string();

    let (status, started) = send(
        &app,
        post_json("/pipeline/jobs", json!({"file_id": file_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let job_id = started["job_id"].as_str().unwrap().to_string();

    // Poll until the background run reaches a terminal state
    let mut terminal = None;
    for _ in 0..100 {
        let (_, job) = send(&app, get(&format!("/pipeline/jobs/{}", job_id))).await;
        let status = job["status"].as_str().unwrap_or("").to_string();
        if status == "COMPLETED" || status == "FAILED" || status == "CANCELLED" {
            terminal = Some(job);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let job = terminal.expect("job should finish");
    assert_eq!(job["status"], "COMPLETED");
    assert_eq!(job["processed_rows"], 2);
    assert_eq!(job["error_rows"], 0);
    assert_eq!(fam_etl::db::assets::count_assets(&pool).await.unwrap(), 2);

    let response = app
        .clone()
        .oneshot(get(&format!("/pipeline/jobs/{}/phase-results/download", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(disposition.starts_with("attachment"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let trail: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(trail["phases"].as_array().unwrap().len(), 6);

    // Cancelling a finished job is a conflict
    let (status, _) = send(
        &app,
        post_json(&format!("/pipeline/jobs/{}/cancel", job_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn starting_a_job_for_a_missing_file_is_not_found() {
    let (app, _pool) = create_test_app().await;
    let (status, _) = send(
        &app,
        post_json(
            "/pipeline/jobs",
            json!({"file_id": "00000000-0000-0000-0000-000000000000"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
