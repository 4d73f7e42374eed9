//! Collaborator services: product analysis, grading, recommendations and scan history.
//!
//! [`GradeService`] is the seam the remote weight resolver talks through;
//! [`HttpServiceClient`] is the production implementation.

pub mod client;
pub mod error;
pub mod models;

pub use client::{HttpServiceClient, DEFAULT_HISTORY_LIMIT};
pub use error::ServiceError;
pub use models::{
    FoodAnalysis, Grade, GradeRequest, GradeResult, Priorities, Recommendation,
    RecommendationRequest, ScanHistoryItem,
};

/// Anything that can turn scores + raw priorities into a grade with normalized weights.
#[async_trait::async_trait]
pub trait GradeService: Send + Sync {
    async fn calculate_grade(
        &self,
        user_id: u64,
        request: &GradeRequest,
        save_history: bool,
    ) -> Result<GradeResult, ServiceError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}
