// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /weights/derive (happy path + 422 on out-of-range sliders)
// - POST /weights/resolve (local resolver; remote resolver whose grade service fails)
// - GET/PUT/DELETE /settings/{user_id}

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use econutri_weights::api::{self, AppState};
use econutri_weights::resolver::{LocalResolver, RemoteResolver};
use econutri_weights::service::{GradeRequest, GradeResult, GradeService, ServiceError};
use econutri_weights::settings::{MemorySettingsStore, UserSettings};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    let settings = UserSettings::new(Arc::new(MemorySettingsStore::new()));
    api::router(AppState::new(Arc::new(LocalResolver), settings, false))
}

/// Grade service that is always down.
struct DownGrade;

#[async_trait::async_trait]
impl GradeService for DownGrade {
    async fn calculate_grade(
        &self,
        _user_id: u64,
        _request: &GradeRequest,
        _save_history: bool,
    ) -> Result<GradeResult, ServiceError> {
        Err(ServiceError::Server {
            detail: "db down".into(),
        })
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

fn remote_down_router() -> Router {
    let settings = UserSettings::new(Arc::new(MemorySettingsStore::new()));
    let resolver = RemoteResolver::new(DownGrade, Duration::from_secs(1));
    api::router(AppState::new(Arc::new(resolver), settings, false))
}

fn scores() -> Json {
    json!({
        "barcode": "8801234567890",
        "name": "Oat Drink",
        "nutrition": { "score": 88.0 },
        "packaging": { "score": 80.0, "material": "PET" },
        "additives": { "score": 70.0, "count": 1 }
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(http::header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Json::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, v)
}

fn sliders(a: i64, b: i64, c: i64) -> Json {
    json!({ "packagingVsAdditives": a, "packagingVsNutrition": b, "additivesVsNutrition": c })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("OK".into()));
}

#[tokio::test]
async fn derive_returns_percentages_fractions_and_labels() {
    let app = test_router();
    let (status, v) = send(&app, "POST", "/weights/derive", Some(sliders(7, 7, 0))).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(v["weights"]["packaging"], 2.2);
    assert_eq!(v["weights"]["additives"], 48.9);
    assert_eq!(v["weights"]["nutrition"], 48.9);
    assert_eq!(v["fractions"]["packaging_weight"], 0.022);
    assert_eq!(v["sliders"][0]["importance"], "strong");
    assert_eq!(v["sliders"][2]["importance"], "slight");
}

#[tokio::test]
async fn derive_neutral_is_equal_split() {
    let app = test_router();
    let (_, v) = send(&app, "POST", "/weights/derive", Some(sliders(0, 0, 0))).await;
    assert_eq!(
        v["weights"],
        json!({ "packaging": 33.3, "additives": 33.3, "nutrition": 33.4 })
    );
}

#[tokio::test]
async fn derive_rejects_out_of_range_with_field_messages() {
    let app = test_router();
    let (status, v) = send(&app, "POST", "/weights/derive", Some(sliders(8, 0, -12))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let detail = v["detail"].as_array().expect("detail array");
    assert_eq!(detail.len(), 2);
    assert_eq!(detail[0]["loc"], json!(["body", "packagingVsAdditives"]));
    assert_eq!(detail[1]["loc"], json!(["body", "additivesVsNutrition"]));
    assert!(detail[1]["msg"].as_str().unwrap().contains("-12"));
}

#[tokio::test]
async fn resolve_with_local_resolver_applies_latest() {
    let app = test_router();
    let body = json!({ "user_id": 11, "judgment": sliders(-5, 0, 0) });
    let (status, v) = send(&app, "POST", "/weights/resolve", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "local");
    assert_eq!(v["resolver"], "local");
    assert_eq!(v["applied"], true);
    assert_eq!(v["weights"], v["resolved"]);
    assert_eq!(v["weights"]["packaging"], 61.1);
    assert_eq!(v["weights"]["additives"], 5.6);
}

#[tokio::test]
async fn settings_default_then_save_then_delete() {
    let app = test_router();

    let (status, v) = send(&app, "GET", "/settings/5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["persisted"], false);
    assert_eq!(v["judgment"], sliders(0, 0, 0));

    let (status, v) = send(
        &app,
        "PUT",
        "/settings/5",
        Some(json!({ "judgment": sliders(1, 1, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["weights"]["packaging"], 11.2);

    let (_, v) = send(&app, "GET", "/settings/5", None).await;
    assert_eq!(v["persisted"], true);
    assert_eq!(v["judgment"], sliders(1, 1, 0));
    assert_eq!(v["weights"]["additives"], 44.4);

    let (status, _) = send(&app, "DELETE", "/settings/5", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, v) = send(&app, "GET", "/settings/5", None).await;
    assert_eq!(v["persisted"], false);
}

#[tokio::test]
async fn settings_keep_confirmed_weights_verbatim() {
    let app = test_router();
    let confirmed = json!({ "packaging": 20.0, "additives": 30.0, "nutrition": 50.0 });
    let (status, _) = send(
        &app,
        "PUT",
        "/settings/8",
        Some(json!({ "judgment": sliders(0, 0, 0), "weights": confirmed })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, v) = send(&app, "GET", "/settings/8", None).await;
    assert_eq!(v["weights"], confirmed);
}

#[tokio::test]
async fn settings_reject_weights_not_summing_to_100() {
    let app = test_router();
    let bad = json!({ "packaging": 20.0, "additives": 30.0, "nutrition": 40.0 });
    let (status, _) = send(
        &app,
        "PUT",
        "/settings/8",
        Some(json!({ "judgment": sliders(0, 0, 0), "weights": bad })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn remote_failure_keeps_saved_weights_on_display() {
    let app = remote_down_router();
    let (status, _) = send(
        &app,
        "PUT",
        "/settings/2",
        Some(json!({ "judgment": sliders(7, 7, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let body = json!({ "user_id": 2, "judgment": sliders(-3, 0, 0), "scores": scores() });
    let (status, v) = send(&app, "POST", "/weights/resolve", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["source"], "default");
    assert_eq!(v["applied"], false);
    assert_eq!(
        v["weights"],
        json!({ "packaging": 2.2, "additives": 48.9, "nutrition": 48.9 })
    );

    // Stored settings are untouched too.
    let (_, v) = send(&app, "GET", "/settings/2", None).await;
    assert_eq!(v["weights"]["packaging"], 2.2);
}

#[tokio::test]
async fn delete_settings_resets_the_display() {
    let app = remote_down_router();
    send(
        &app,
        "PUT",
        "/settings/4",
        Some(json!({ "judgment": sliders(7, 7, 0) })),
    )
    .await;
    let body = json!({ "user_id": 4, "judgment": sliders(0, 0, 0), "scores": scores() });
    let (_, v) = send(&app, "POST", "/weights/resolve", Some(body.clone())).await;
    assert_eq!(v["weights"]["packaging"], 2.2);

    let (status, _) = send(&app, "DELETE", "/settings/4", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, v) = send(&app, "POST", "/weights/resolve", Some(body)).await;
    assert_eq!(
        v["weights"],
        json!({ "packaging": 33.3, "additives": 33.3, "nutrition": 33.4 })
    );
}
