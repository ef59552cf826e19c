//! Scoring oracle contract.

use async_trait::async_trait;

use vcheck_models::AnalysisRequest;

use crate::error::OracleResult;
use crate::types::RawVerdict;

/// External capability that scores sampled frames plus context.
///
/// Implementations make exactly one attempt per call and never substitute a
/// default verdict for a failure.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Short name for logs and metrics labels.
    fn name(&self) -> &str;

    async fn score(&self, request: &AnalysisRequest) -> OracleResult<RawVerdict>;
}
