//! # Pairwise Judgments
//! Three bounded slider values comparing the criteria two at a time.
//!
//! Each value is an integer in `[-7, 7]`. `0` means both criteria matter
//! equally; the sign says which side is favored and the magnitude how
//! strongly. Field names serialize in camelCase to match the persisted
//! `userSliderValues_{userId}` shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lowest value a slider can take.
pub const JUDGMENT_MIN: i8 = -7;
/// Highest value a slider can take.
pub const JUDGMENT_MAX: i8 = 7;

/// One of the three scored dimensions of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Packaging,
    Additives,
    Nutrition,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [Self::Packaging, Self::Additives, Self::Nutrition];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Packaging => "packaging",
            Self::Additives => "additives",
            Self::Nutrition => "nutrition",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's three pairwise comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseJudgment {
    /// Positive: packaging matters more than additives.
    pub packaging_vs_additives: i8,
    /// Positive: packaging matters more than nutrition.
    pub packaging_vs_nutrition: i8,
    /// Positive: additives matter more than nutrition.
    pub additives_vs_nutrition: i8,
}

/// A single out-of-range slider value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub value: i64,
}

/// Returned by [`PairwiseJudgment::try_new`] when any slider is outside `[-7, 7]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("judgment out of range: {}", describe(.violations))]
pub struct JudgmentError {
    pub violations: Vec<FieldViolation>,
}

impl JudgmentError {
    /// One `field - message` line per violation, the way validation
    /// errors are shown to the user.
    pub fn messages(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| {
                format!(
                    "{} - must be between {} and {} (got {})",
                    v.field, JUDGMENT_MIN, JUDGMENT_MAX, v.value
                )
            })
            .collect()
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}={}", v.field, v.value))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PairwiseJudgment {
    /// All sliders centered.
    pub const NEUTRAL: Self = Self {
        packaging_vs_additives: 0,
        packaging_vs_nutrition: 0,
        additives_vs_nutrition: 0,
    };

    /// Strict constructor for untrusted input. Every offending field is reported.
    pub fn try_new(
        packaging_vs_additives: i64,
        packaging_vs_nutrition: i64,
        additives_vs_nutrition: i64,
    ) -> Result<Self, JudgmentError> {
        let fields = [
            ("packagingVsAdditives", packaging_vs_additives),
            ("packagingVsNutrition", packaging_vs_nutrition),
            ("additivesVsNutrition", additives_vs_nutrition),
        ];
        let violations: Vec<FieldViolation> = fields
            .iter()
            .filter(|(_, v)| !in_range(*v))
            .map(|&(field, value)| FieldViolation { field, value })
            .collect();
        if !violations.is_empty() {
            return Err(JudgmentError { violations });
        }
        // In range, so the narrowing casts are lossless.
        Ok(Self {
            packaging_vs_additives: packaging_vs_additives as i8,
            packaging_vs_nutrition: packaging_vs_nutrition as i8,
            additives_vs_nutrition: additives_vs_nutrition as i8,
        })
    }

    /// Lenient constructor: saturates each value into `[-7, 7]` and logs when it had to.
    pub fn clamped(
        packaging_vs_additives: i64,
        packaging_vs_nutrition: i64,
        additives_vs_nutrition: i64,
    ) -> Self {
        let j = Self {
            packaging_vs_additives: clamp_value(packaging_vs_additives),
            packaging_vs_nutrition: clamp_value(packaging_vs_nutrition),
            additives_vs_nutrition: clamp_value(additives_vs_nutrition),
        };
        if !(in_range(packaging_vs_additives)
            && in_range(packaging_vs_nutrition)
            && in_range(additives_vs_nutrition))
        {
            warn!(
                packaging_vs_additives,
                packaging_vs_nutrition,
                additives_vs_nutrition,
                clamped = ?j,
                "judgment clamped into slider range"
            );
        }
        j
    }

    /// Re-clamp a value that may have been built by hand or deserialized.
    pub fn sanitized(self) -> Self {
        Self::clamped(
            self.packaging_vs_additives.into(),
            self.packaging_vs_nutrition.into(),
            self.additives_vs_nutrition.into(),
        )
    }

    pub fn is_valid(&self) -> bool {
        [
            self.packaging_vs_additives,
            self.packaging_vs_nutrition,
            self.additives_vs_nutrition,
        ]
        .iter()
        .all(|&v| in_range(v.into()))
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// The three comparisons as `(left, right, value)` triples.
    pub fn pairs(&self) -> [(Criterion, Criterion, i8); 3] {
        [
            (
                Criterion::Packaging,
                Criterion::Additives,
                self.packaging_vs_additives,
            ),
            (
                Criterion::Packaging,
                Criterion::Nutrition,
                self.packaging_vs_nutrition,
            ),
            (
                Criterion::Additives,
                Criterion::Nutrition,
                self.additives_vs_nutrition,
            ),
        ]
    }
}

fn in_range(v: i64) -> bool {
    (i64::from(JUDGMENT_MIN)..=i64::from(JUDGMENT_MAX)).contains(&v)
}

fn clamp_value(v: i64) -> i8 {
    v.clamp(i64::from(JUDGMENT_MIN), i64::from(JUDGMENT_MAX)) as i8
}

/// Label shown under a slider for the side it leans toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceLevel {
    Slight,
    Moderate,
    Strong,
}

impl ImportanceLevel {
    /// `|v| >= 6` strong, `>= 4` moderate, anything else slight.
    pub fn from_value(value: i8) -> Self {
        match value.unsigned_abs() {
            6..=u8::MAX => Self::Strong,
            4 | 5 => Self::Moderate,
            _ => Self::Slight,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Slight => "slightly important",
            Self::Moderate => "important",
            Self::Strong => "very important",
        }
    }
}
