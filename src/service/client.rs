// src/service/client.rs
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::ServiceError;
use super::models::{
    FoodAnalysis, GradeRequest, GradeResult, Recommendation, RecommendationRequest,
    ScanHistoryItem, ValidationBody,
};
use super::GradeService;

/// Default page size for the history list.
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// reqwest-backed client for the analysis, grade, recommendation and history endpoints.
#[derive(Clone)]
pub struct HttpServiceClient {
    http: Client,
    base_url: String,
}

impl HttpServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .user_agent(concat!("econutri-weights/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /foods/analysis/{barcode}`
    pub async fn food_analysis(&self, barcode: &str) -> Result<FoodAnalysis, ServiceError> {
        let barcode = normalize_barcode(barcode)?;
        let url = format!("{}/foods/analysis/{}", self.base_url, barcode);
        let resp = self.http.get(url).send().await?;
        decode(resp, "food analysis", Some("product")).await
    }

    /// `POST /foods/calculate-grade?user_id=&save_history=`
    pub async fn calculate_grade(
        &self,
        user_id: u64,
        request: &GradeRequest,
        save_history: bool,
    ) -> Result<GradeResult, ServiceError> {
        if user_id == 0 {
            return Err(ServiceError::InvalidRequest("user id is required"));
        }
        debug!(user_id, save_history, priorities = ?request.priorities, "grade request");
        let url = format!("{}/foods/calculate-grade", self.base_url);
        let resp = self
            .http
            .post(url)
            .query(&[
                ("user_id", user_id.to_string()),
                ("save_history", save_history.to_string()),
            ])
            .json(request)
            .send()
            .await?;
        decode(resp, "grade calculation", None).await
    }

    /// `POST /recommendations/alternatives`
    pub async fn alternatives(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        if request.report_no.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("report number is required"));
        }
        let url = format!("{}/recommendations/alternatives", self.base_url);
        let resp = self.http.post(url).json(request).send().await?;
        decode(resp, "alternative recommendations", Some("alternative products")).await
    }

    /// `GET /history/me?user_id=&skip=&limit=`
    pub async fn scan_history(
        &self,
        user_id: u64,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ScanHistoryItem>, ServiceError> {
        if user_id == 0 {
            return Err(ServiceError::InvalidRequest("user id is required"));
        }
        let url = format!("{}/history/me", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[
                ("user_id", user_id.to_string()),
                ("skip", skip.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        decode(resp, "scan history", None).await
    }

    /// `GET /history/{scan_id}?user_id=`
    pub async fn scan_history_detail(
        &self,
        scan_id: u64,
        user_id: u64,
    ) -> Result<ScanHistoryItem, ServiceError> {
        check_ids(scan_id, user_id)?;
        let url = format!("{}/history/{}", self.base_url, scan_id);
        let resp = self
            .http
            .get(url)
            .query(&[("user_id", user_id.to_string())])
            .send()
            .await?;
        decode(resp, "scan history detail", Some("scan record")).await
    }

    /// `DELETE /history/{scan_id}?user_id=`
    pub async fn delete_scan_history(
        &self,
        scan_id: u64,
        user_id: u64,
    ) -> Result<(), ServiceError> {
        check_ids(scan_id, user_id)?;
        let url = format!("{}/history/{}", self.base_url, scan_id);
        let resp = self
            .http
            .delete(url)
            .query(&[("user_id", user_id.to_string())])
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(error_from(resp, "scan history delete", Some("scan record")).await)
    }
}

#[async_trait::async_trait]
impl GradeService for HttpServiceClient {
    async fn calculate_grade(
        &self,
        user_id: u64,
        request: &GradeRequest,
        save_history: bool,
    ) -> Result<GradeResult, ServiceError> {
        HttpServiceClient::calculate_grade(self, user_id, request, save_history).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Trimmed, non-empty barcode.
pub fn normalize_barcode(raw: &str) -> Result<&str, ServiceError> {
    let b = raw.trim();
    if b.is_empty() {
        return Err(ServiceError::InvalidRequest("barcode is required"));
    }
    Ok(b)
}

fn check_ids(scan_id: u64, user_id: u64) -> Result<(), ServiceError> {
    if scan_id == 0 {
        return Err(ServiceError::InvalidRequest("scan id is required"));
    }
    if user_id == 0 {
        return Err(ServiceError::InvalidRequest("user id is required"));
    }
    Ok(())
}

async fn decode<T: DeserializeOwned>(
    resp: Response,
    context: &'static str,
    subject: Option<&'static str>,
) -> Result<T, ServiceError> {
    if !resp.status().is_success() {
        return Err(error_from(resp, context, subject).await);
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Map a non-2xx response onto the error taxonomy. `subject` names the
/// resource for 404/403; without it those fall through to `Status`.
async fn error_from(
    resp: Response,
    context: &'static str,
    subject: Option<&'static str>,
) -> ServiceError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    warn!(%status, context, "collaborator returned error");

    match (status, subject) {
        (StatusCode::NOT_FOUND, Some(s)) => ServiceError::NotFound(s),
        (StatusCode::FORBIDDEN, Some(s)) => ServiceError::Forbidden(s),
        (StatusCode::UNPROCESSABLE_ENTITY, _) => ServiceError::Validation {
            messages: validation_messages(&body),
        },
        (StatusCode::INTERNAL_SERVER_ERROR, _) => ServiceError::Server {
            detail: server_detail(&body),
        },
        _ => ServiceError::Status { status, context },
    }
}

fn validation_messages(body: &str) -> Vec<String> {
    match serde_json::from_str::<ValidationBody>(body) {
        Ok(v) if !v.detail.is_empty() => v.detail.iter().map(|i| i.render()).collect(),
        _ => vec!["invalid request".to_string()],
    }
}

fn server_detail(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        return match v.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => v.to_string(),
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "internal server error".to_string()
    } else {
        trimmed.to_string()
    }
}
