// src/api.rs
//! HTTP surface: derive/resolve weights and read/write per-user settings.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::judgment::{ImportanceLevel, JudgmentError, PairwiseJudgment};
use crate::resolver::{DynResolver, ResolveContext, WeightSource};
use crate::service::FoodAnalysis;
use crate::session::DisplayRegistry;
use crate::settings::{StoredSettings, UserSettings};
use crate::weights::{derive_weights, FractionWeights, WeightVector};

#[derive(Clone)]
pub struct AppState {
    pub resolver: DynResolver,
    pub settings: UserSettings,
    pub displays: Arc<DisplayRegistry>,
    pub save_history: bool,
}

impl AppState {
    pub fn new(resolver: DynResolver, settings: UserSettings, save_history: bool) -> Self {
        Self {
            resolver,
            settings,
            displays: Arc::new(DisplayRegistry::new()),
            save_history,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/weights/derive", post(derive))
        .route("/weights/resolve", post(resolve))
        .route(
            "/settings/{user_id}",
            get(get_settings).put(put_settings).delete(delete_settings),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Errors returned by handlers.
pub enum ApiError {
    Validation(JudgmentError),
    Internal(anyhow::Error),
}

impl From<JudgmentError> for ApiError {
    fn from(e: JudgmentError) -> Self {
        Self::Validation(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Same `{"detail": [{loc, msg, type}]}` shape the grade service uses.
            Self::Validation(e) => {
                let msgs = e.messages();
                let detail: Vec<_> = e
                    .violations
                    .iter()
                    .zip(msgs)
                    .map(|(v, msg)| {
                        serde_json::json!({
                            "loc": ["body", v.field],
                            "msg": msg,
                            "type": "value_error.range",
                        })
                    })
                    .collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({ "detail": detail })),
                )
                    .into_response()
            }
            Self::Internal(e) => {
                error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "detail": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Untrusted slider input; wide integers so range errors reach our own validation.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgmentInput {
    pub packaging_vs_additives: i64,
    pub packaging_vs_nutrition: i64,
    pub additives_vs_nutrition: i64,
}

impl JudgmentInput {
    fn validate(self) -> Result<PairwiseJudgment, JudgmentError> {
        PairwiseJudgment::try_new(
            self.packaging_vs_additives,
            self.packaging_vs_nutrition,
            self.additives_vs_nutrition,
        )
    }
}

#[derive(Serialize)]
struct SliderLabel {
    value: i8,
    importance: ImportanceLevel,
    label: &'static str,
}

#[derive(Serialize)]
struct DeriveResp {
    weights: WeightVector,
    fractions: FractionWeights,
    sliders: [SliderLabel; 3],
}

async fn derive(Json(body): Json<JudgmentInput>) -> Result<Json<DeriveResp>, ApiError> {
    let judgment = body.validate()?;
    let weights = derive_weights(&judgment);
    let sliders = judgment.pairs().map(|(_, _, value)| {
        let importance = ImportanceLevel::from_value(value);
        SliderLabel {
            value,
            importance,
            label: importance.label(),
        }
    });
    Ok(Json(DeriveResp {
        weights,
        fractions: weights.to_fractions(),
        sliders,
    }))
}

#[derive(Deserialize)]
struct ResolveReq {
    user_id: u64,
    judgment: JudgmentInput,
    #[serde(default)]
    scores: Option<FoodAnalysis>,
}

#[derive(Serialize)]
struct ResolveResp {
    /// What is displayed after this request: newer than `resolved` when a later
    /// request already landed, the previous weights when `resolved` is a fallback.
    weights: WeightVector,
    resolved: WeightVector,
    source: WeightSource,
    applied: bool,
    resolver: &'static str,
}

async fn resolve(
    State(state): State<AppState>,
    Json(body): Json<ResolveReq>,
) -> Result<Json<ResolveResp>, ApiError> {
    let judgment = body.judgment.validate()?;

    let display = match state.displays.get(body.user_id) {
        Some(d) => d,
        None => {
            let seed = state.settings.load(body.user_id).weights;
            state.displays.get_or_insert(body.user_id, seed)
        }
    };
    let ticket = display.begin();

    let ctx = ResolveContext {
        user_id: Some(body.user_id),
        scores: body.scores,
        save_history: state.save_history,
    };
    let resolved = state.resolver.resolve(&judgment, &ctx).await;
    // A fallback never replaces what the user already sees.
    let applied = if resolved.is_fallback() {
        display.keep(ticket);
        false
    } else {
        display.apply(ticket, resolved.weights)
    };

    Ok(Json(ResolveResp {
        weights: display.current(),
        resolved: resolved.weights,
        source: resolved.source,
        applied,
        resolver: state.resolver.name(),
    }))
}

async fn get_settings(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Json<StoredSettings> {
    Json(state.settings.load(user_id))
}

#[derive(Deserialize)]
struct SaveReq {
    judgment: JudgmentInput,
    /// Weights the user confirmed; derived locally when absent.
    #[serde(default)]
    weights: Option<WeightVector>,
}

async fn put_settings(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(body): Json<SaveReq>,
) -> Result<Json<StoredSettings>, ApiError> {
    let judgment = body.judgment.validate()?;
    let weights = body.weights.unwrap_or_else(|| derive_weights(&judgment));
    state.settings.save(user_id, &judgment, &weights)?;
    Ok(Json(StoredSettings {
        judgment,
        weights,
        persisted: true,
    }))
}

async fn delete_settings(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.settings.clear(user_id)?;
    state.displays.remove(user_id);
    state.resolver.forget(user_id);
    Ok(StatusCode::NO_CONTENT)
}
