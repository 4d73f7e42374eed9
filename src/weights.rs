//! # Weight Derivation
//! Pure mapping from a [`PairwiseJudgment`] to a normalized three-way split.
//!
//! Weights are held as integer tenths of a percent, so "sums to 100.0" is an
//! exact integer check (`1000` tenths) rather than a float comparison.
//!
//! Algorithm:
//! 1. Each comparison moves the *opposing* criterion's accumulator by the
//!    judgment value and the left criterion's by its negation.
//! 2. If any accumulator is negative, all three shift by `|min| + 1`.
//! 3. Zero total yields the fixed split 33.3 / 33.3 / 33.4.
//! 4. Otherwise each share is rounded to one decimal and any drift from
//!    100.0 is added to packaging.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::judgment::{Criterion, PairwiseJudgment};

/// 100.0 % expressed in tenths.
pub const TOTAL_TENTHS: u16 = 1000;

/// Normalized weights, in tenths of a percent. Invariant: fields sum to 1000.
///
/// Serializes as percentages: `{"packaging": 33.3, "additives": 33.3, "nutrition": 33.4}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "PercentRepr", try_from = "PercentRepr")]
pub struct WeightVector {
    packaging: u16,
    additives: u16,
    nutrition: u16,
}

impl Default for WeightVector {
    fn default() -> Self {
        Self::EQUAL_SPLIT
    }
}

impl WeightVector {
    /// The degenerate-input split; the odd 0.1 goes to nutrition.
    pub const EQUAL_SPLIT: Self = Self {
        packaging: 333,
        additives: 333,
        nutrition: 334,
    };

    /// Build from tenths. Returns `None` unless they sum to exactly 1000.
    pub fn from_tenths(packaging: u16, additives: u16, nutrition: u16) -> Option<Self> {
        let sum = u32::from(packaging) + u32::from(additives) + u32::from(nutrition);
        (sum == u32::from(TOTAL_TENTHS)).then_some(Self {
            packaging,
            additives,
            nutrition,
        })
    }

    pub fn packaging(&self) -> f64 {
        tenths_to_percent(self.packaging)
    }

    pub fn additives(&self) -> f64 {
        tenths_to_percent(self.additives)
    }

    pub fn nutrition(&self) -> f64 {
        tenths_to_percent(self.nutrition)
    }

    pub fn get(&self, c: Criterion) -> f64 {
        tenths_to_percent(self.tenths(c))
    }

    pub fn tenths(&self, c: Criterion) -> u16 {
        match c {
            Criterion::Packaging => self.packaging,
            Criterion::Additives => self.additives,
            Criterion::Nutrition => self.nutrition,
        }
    }

    /// Always 100.0; exposed so callers can assert the invariant.
    pub fn total(&self) -> f64 {
        tenths_to_percent(self.packaging + self.additives + self.nutrition)
    }

    /// Weights as fractions of 1, the representation the grade service expects.
    pub fn to_fractions(&self) -> FractionWeights {
        FractionWeights {
            packaging_weight: f64::from(self.packaging) / f64::from(TOTAL_TENTHS),
            additives_weight: f64::from(self.additives) / f64::from(TOTAL_TENTHS),
            nutrition_weight: f64::from(self.nutrition) / f64::from(TOTAL_TENTHS),
        }
    }

    /// Convert weights received from a remote scorer into percentages.
    ///
    /// Accepts either fractions of 1 (the documented wire form) or
    /// percentages of 100. Each value is rounded to one decimal and the
    /// same packaging-only correction as [`derive_weights`] restores the
    /// exact total. Negative, non-finite or all-zero inputs are rejected.
    pub fn from_remote(remote: &FractionWeights) -> Result<Self, WeightError> {
        let raw = [
            remote.packaging_weight,
            remote.additives_weight,
            remote.nutrition_weight,
        ];
        if raw.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(WeightError::Invalid(raw));
        }
        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            return Err(WeightError::Invalid(raw));
        }
        let repr = WeightScale::detect(sum);
        let scale = repr.tenths_per_unit();
        // Checked in f64 first: the sum can be huge or infinite, and the
        // integer casts below are only lossless near 1000.
        if (sum * scale - f64::from(TOTAL_TENTHS)).abs() > MAX_REMOTE_DRIFT as f64 {
            return Err(WeightError::Unnormalized { sum, scale: repr });
        }

        let mut tenths = raw.map(|v| (v * scale).round() as i64);
        let drift = i64::from(TOTAL_TENTHS) - tenths.iter().sum::<i64>();
        if drift.abs() > MAX_REMOTE_DRIFT {
            return Err(WeightError::Unnormalized { sum, scale: repr });
        }
        tenths[0] += drift;
        if tenths[0] < 0 {
            return Err(WeightError::Invalid(raw));
        }
        Ok(Self {
            packaging: tenths[0] as u16,
            additives: tenths[1] as u16,
            nutrition: tenths[2] as u16,
        })
    }

    /// Score combined with these weights, on the criterion scores' own scale.
    pub fn weighted_total(&self, scores: &CriterionScores) -> f64 {
        Criterion::ALL
            .iter()
            .map(|&c| scores.get(c) * f64::from(self.tenths(c)))
            .sum::<f64>()
            / f64::from(TOTAL_TENTHS)
    }

    /// Human-readable breakdown, e.g. `(85 × 0.186) + (78 × 0.333) + (88 × 0.481)`.
    pub fn formula(&self, scores: &CriterionScores) -> String {
        let f = self.to_fractions();
        format!(
            "({} × {:.3}) + ({} × {:.3}) + ({} × {:.3})",
            scores.packaging,
            f.packaging_weight,
            scores.additives,
            f.additives_weight,
            scores.nutrition,
            f.nutrition_weight
        )
    }
}

impl fmt::Display for WeightVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packaging {:.1}% / additives {:.1}% / nutrition {:.1}%",
            self.packaging(),
            self.additives(),
            self.nutrition()
        )
    }
}

/// Largest rounding drift tolerated from a remote scorer, in tenths.
const MAX_REMOTE_DRIFT: i64 = 5;

fn tenths_to_percent(t: u16) -> f64 {
    f64::from(t) / 10.0
}

/// Which scale a remote weight triple was expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightScale {
    Fraction,
    Percent,
}

impl WeightScale {
    /// Fractions sum to ~1, percentages to ~100; anything above 1.5 is taken as percent.
    pub fn detect(sum: f64) -> Self {
        if sum > 1.5 {
            Self::Percent
        } else {
            Self::Fraction
        }
    }

    fn tenths_per_unit(self) -> f64 {
        match self {
            Self::Fraction => f64::from(TOTAL_TENTHS),
            Self::Percent => 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightError {
    #[error("remote weights contain negative or non-finite values: {0:?}")]
    Invalid([f64; 3]),
    #[error("remote weights sum to {sum} and do not normalize as {scale:?}")]
    Unnormalized { sum: f64, scale: WeightScale },
}

/// Weights as fractions of 1, named the way the grade service names them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionWeights {
    pub packaging_weight: f64,
    pub additives_weight: f64,
    pub nutrition_weight: f64,
}

/// Per-criterion subscores for one product, typically each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CriterionScores {
    pub packaging: f64,
    pub additives: f64,
    pub nutrition: f64,
}

impl CriterionScores {
    pub fn get(&self, c: Criterion) -> f64 {
        match c {
            Criterion::Packaging => self.packaging,
            Criterion::Additives => self.additives,
            Criterion::Nutrition => self.nutrition,
        }
    }
}

/// Persisted/JSON form: one-decimal percentages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PercentRepr {
    packaging: f64,
    additives: f64,
    nutrition: f64,
}

impl From<WeightVector> for PercentRepr {
    fn from(w: WeightVector) -> Self {
        Self {
            packaging: w.packaging(),
            additives: w.additives(),
            nutrition: w.nutrition(),
        }
    }
}

impl TryFrom<PercentRepr> for WeightVector {
    type Error = String;

    fn try_from(p: PercentRepr) -> Result<Self, Self::Error> {
        let to_tenths = |v: f64| -> Result<u16, String> {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(format!("weight {v} outside 0..=100"));
            }
            Ok((v * 10.0).round() as u16)
        };
        let (p_t, a_t, n_t) = (
            to_tenths(p.packaging)?,
            to_tenths(p.additives)?,
            to_tenths(p.nutrition)?,
        );
        WeightVector::from_tenths(p_t, a_t, n_t).ok_or_else(|| {
            format!(
                "weights {} + {} + {} do not sum to 100",
                p.packaging, p.additives, p.nutrition
            )
        })
    }
}

/// Signed per-criterion accumulators before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulators {
    pub packaging: i32,
    pub additives: i32,
    pub nutrition: i32,
}

impl Accumulators {
    /// Steps 1-4: each comparison subtracts its value from the left
    /// criterion and adds it to the right one.
    pub fn from_judgment(j: &PairwiseJudgment) -> Self {
        let mut acc = Self {
            packaging: 0,
            additives: 0,
            nutrition: 0,
        };
        let pva = i32::from(j.packaging_vs_additives);
        let pvn = i32::from(j.packaging_vs_nutrition);
        let avn = i32::from(j.additives_vs_nutrition);

        acc.packaging -= pva;
        acc.additives += pva;

        acc.packaging -= pvn;
        acc.nutrition += pvn;

        acc.additives -= avn;
        acc.nutrition += avn;
        acc
    }

    /// Step 5: shift everything strictly positive when any score is negative.
    /// Returns the offset applied (0 when none was needed).
    pub fn apply_offset(&mut self) -> i32 {
        let min = self.packaging.min(self.additives).min(self.nutrition);
        if min >= 0 {
            return 0;
        }
        let offset = min.abs() + 1;
        self.packaging += offset;
        self.additives += offset;
        self.nutrition += offset;
        offset
    }

    pub fn total(&self) -> i32 {
        self.packaging + self.additives + self.nutrition
    }
}

/// Local, offline weight derivation. Pure and total over valid judgments;
/// out-of-range input is clamped first.
pub fn derive_weights(judgment: &PairwiseJudgment) -> WeightVector {
    let judgment = if judgment.is_valid() {
        *judgment
    } else {
        judgment.sanitized()
    };

    let mut acc = Accumulators::from_judgment(&judgment);
    acc.apply_offset();

    let total = acc.total();
    if total == 0 {
        debug!(?judgment, "zero total, using equal split");
        return WeightVector::EQUAL_SPLIT;
    }

    let mut tenths = [acc.packaging, acc.additives, acc.nutrition].map(|s| share_tenths(s, total));
    let sum: i32 = tenths.iter().sum();
    if sum != i32::from(TOTAL_TENTHS) {
        let drift = i32::from(TOTAL_TENTHS) - sum;
        debug!(?judgment, drift, "rounding correction applied to packaging");
        metrics::counter!("econutri_rounding_corrections_total").increment(1);
        tenths[0] += drift;
    }
    metrics::counter!("econutri_weights_derived_total").increment(1);

    // Offset keeps every accumulator >= 1, so each share is at least
    // round(1000 / 45) and a drift of a few tenths cannot go negative.
    WeightVector {
        packaging: tenths[0].max(0) as u16,
        additives: tenths[1].max(0) as u16,
        nutrition: tenths[2].max(0) as u16,
    }
}

/// `round(score / total * 100, 1)` in tenths, half rounded up, integer-exact.
fn share_tenths(score: i32, total: i32) -> i32 {
    let (score, total) = (i64::from(score), i64::from(total));
    ((2 * i64::from(TOTAL_TENTHS) * score + total) / (2 * total)) as i32
}
