//! # Weight Resolver
//! One capability, two interchangeable strategies:
//!
//! - [`LocalResolver`]: deterministic, offline, calls [`derive_weights`].
//! - [`RemoteResolver`]: sends the raw judgment to a [`GradeService`] and
//!   converts the returned fractions to percentages. Any failure (error,
//!   timeout, malformed weights, missing scores) falls back to that user's
//!   last good vector or the equal split; it never surfaces as an error.
//!
//! The strategy is picked by [`ResolverMode`] from configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::judgment::PairwiseJudgment;
use crate::service::{FoodAnalysis, GradeRequest, GradeService};
use crate::weights::{derive_weights, WeightVector};

/// Inputs the remote strategy needs beyond the judgment itself.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub user_id: Option<u64>,
    pub scores: Option<FoodAnalysis>,
    pub save_history: bool,
}

/// Where a resolved vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Local,
    Remote,
    /// Remote failed; this user's last good remote result reused.
    Cached,
    /// Remote failed with nothing cached.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub weights: WeightVector,
    pub source: WeightSource,
}

impl Resolved {
    /// True when the weights are a stand-in rather than an answer for this judgment.
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, WeightSource::Cached | WeightSource::Default)
    }
}

#[async_trait::async_trait]
pub trait WeightResolver: Send + Sync {
    async fn resolve(&self, judgment: &PairwiseJudgment, ctx: &ResolveContext) -> Resolved;

    fn name(&self) -> &'static str;

    /// Drop any per-user state, e.g. when the user's settings are cleared.
    fn forget(&self, _user_id: u64) {}
}

pub type DynResolver = Arc<dyn WeightResolver>;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalResolver;

#[async_trait::async_trait]
impl WeightResolver for LocalResolver {
    async fn resolve(&self, judgment: &PairwiseJudgment, _ctx: &ResolveContext) -> Resolved {
        Resolved {
            weights: derive_weights(judgment),
            source: WeightSource::Local,
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Delegates to a grade service and caches the last good answer per user.
pub struct RemoteResolver<S: GradeService> {
    service: S,
    timeout: Duration,
    last_good: Mutex<HashMap<u64, WeightVector>>,
}

impl<S: GradeService> RemoteResolver<S> {
    pub fn new(service: S, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            last_good: Mutex::new(HashMap::new()),
        }
    }

    /// Seed a user's fallback, e.g. with weights restored from their settings.
    pub fn with_cached(self, user_id: u64, weights: WeightVector) -> Self {
        self.remember(user_id, weights);
        self
    }

    pub fn cached(&self, user_id: u64) -> Option<WeightVector> {
        self.last_good
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&user_id)
            .copied()
    }

    fn remember(&self, user_id: u64, weights: WeightVector) {
        self.last_good
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(user_id, weights);
    }

    fn fallback(&self, user_id: Option<u64>, reason: &'static str) -> Resolved {
        metrics::counter!("econutri_remote_fallback_total", "reason" => reason).increment(1);
        match user_id.and_then(|u| self.cached(u)) {
            Some(weights) => {
                warn!(
                    user_id,
                    reason,
                    provider = self.service.name(),
                    "remote resolve failed, using cached weights"
                );
                Resolved {
                    weights,
                    source: WeightSource::Cached,
                }
            }
            None => {
                warn!(
                    user_id,
                    reason,
                    provider = self.service.name(),
                    "remote resolve failed, using equal split"
                );
                Resolved {
                    weights: WeightVector::EQUAL_SPLIT,
                    source: WeightSource::Default,
                }
            }
        }
    }

    async fn resolve_impl(&self, judgment: &PairwiseJudgment, ctx: &ResolveContext) -> Resolved {
        let (Some(user_id), Some(scores)) = (ctx.user_id, ctx.scores.as_ref()) else {
            return self.fallback(ctx.user_id, "missing_context");
        };

        let request = GradeRequest {
            scores: scores.clone(),
            priorities: judgment.sanitized().into(),
        };

        let started = Instant::now();
        let call = self
            .service
            .calculate_grade(user_id, &request, ctx.save_history);
        let outcome = tokio::time::timeout(self.timeout, call).await;
        metrics::histogram!("econutri_remote_resolve_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let result = match outcome {
            Err(_) => return self.fallback(Some(user_id), "timeout"),
            Ok(Err(e)) => {
                debug!(error = %e, "grade service error");
                return self.fallback(Some(user_id), e.kind());
            }
            Ok(Ok(result)) => result,
        };

        match WeightVector::from_remote(&result.weights) {
            Ok(weights) => {
                self.remember(user_id, weights);
                Resolved {
                    weights,
                    source: WeightSource::Remote,
                }
            }
            Err(e) => {
                debug!(error = %e, "grade service returned unusable weights");
                self.fallback(Some(user_id), "bad_weights")
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: GradeService + 'static> WeightResolver for RemoteResolver<S> {
    async fn resolve(&self, judgment: &PairwiseJudgment, ctx: &ResolveContext) -> Resolved {
        self.resolve_impl(judgment, ctx).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }

    fn forget(&self, user_id: u64) {
        self.last_good
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&user_id);
    }
}

/// Which strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    #[default]
    Local,
    Remote,
}

impl FromStr for ResolverMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => anyhow::bail!("unknown resolver mode: {other}"),
        }
    }
}

/// Build the configured strategy. `service` is only used in remote mode.
pub fn build_resolver<S: GradeService + 'static>(
    mode: ResolverMode,
    service: S,
    timeout: Duration,
) -> DynResolver {
    match mode {
        ResolverMode::Local => Arc::new(LocalResolver),
        ResolverMode::Remote => Arc::new(RemoteResolver::new(service, timeout)),
    }
}
