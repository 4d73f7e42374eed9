// src/service/models.rs
//! Wire DTOs for the analysis, grade, recommendation and history endpoints.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::judgment::PairwiseJudgment;
use crate::weights::{CriterionScores, FractionWeights};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionDetail {
    pub score: f64,
    #[serde(default)]
    pub sodium_mg: f64,
    #[serde(default)]
    pub sugar_g: f64,
    #[serde(default)]
    pub sat_fat_g: f64,
    #[serde(default)]
    pub trans_fat_g: f64,
    #[serde(default)]
    pub serving_ml: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingDetail {
    pub score: f64,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub raw_material: Option<String>,
}

fn unknown_risk() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditivesDetail {
    pub score: f64,
    #[serde(default)]
    pub count: u32,
    #[serde(default = "unknown_risk")]
    pub risk_level: String,
}

/// Per-product analysis returned for a barcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodAnalysis {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub report_no: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub nutrition: NutritionDetail,
    pub packaging: PackagingDetail,
    pub additives: AdditivesDetail,
}

impl FoodAnalysis {
    pub fn criterion_scores(&self) -> CriterionScores {
        CriterionScores {
            packaging: self.packaging.score,
            additives: self.additives.score,
            nutrition: self.nutrition.score,
        }
    }
}

/// Raw slider values as the grade service names them. Sent unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priorities {
    pub pkg_vs_add: i8,
    pub pkg_vs_nut: i8,
    pub add_vs_nut: i8,
}

impl From<PairwiseJudgment> for Priorities {
    fn from(j: PairwiseJudgment) -> Self {
        Self {
            pkg_vs_add: j.packaging_vs_additives,
            pkg_vs_nut: j.packaging_vs_nutrition,
            add_vs_nut: j.additives_vs_nutrition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRequest {
    pub scores: FoodAnalysis,
    pub priorities: Priorities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    #[serde(default)]
    pub scan_id: Option<u64>,
    pub user_id: u64,
    #[serde(default)]
    pub food_id: Option<u64>,
    pub name: String,
    pub grade: Grade,
    pub total_score: f64,
    /// Fractions of 1.
    pub weights: FractionWeights,
    pub nutrition_score: f64,
    pub packaging_score: f64,
    pub additives_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub report_no: String,
    pub total_score: f64,
    pub weights: FractionWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub total_score: f64,
    pub grade: Grade,
    pub nutrition_score: f64,
    pub packaging_score: f64,
    pub additives_score: f64,
}

/// Entry in the scan history list; the detail endpoint returns the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistoryItem {
    pub scan_id: u64,
    pub product_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub grade: Grade,
    pub total_score: f64,
    /// Server-local time, no offset.
    pub created_at: NaiveDateTime,
}

/// `{"detail": [{"loc": [...], "msg": "...", "type": "..."}]}` validation body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValidationBody {
    pub detail: Vec<ValidationItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValidationItem {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl ValidationItem {
    /// `loc.joined - msg`, e.g. `body.priorities.pkg_vs_add - value out of range`.
    pub fn render(&self) -> String {
        let loc = self
            .loc
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        if loc.is_empty() {
            self.msg.clone()
        } else {
            format!("{loc} - {}", self.msg)
        }
    }
}
