//! Image classifier port and its strategies.
//!
//! - [`LiveClassifier`] asks a remote vision model for a structured verdict
//! - [`SimulatedClassifier`] draws a random but valid result locally
//! - [`FallbackClassifier`] runs a primary strategy and substitutes the
//!   secondary one whenever the primary is unavailable

use crate::model::{ClassificationResult, ImagePayload};
use thiserror::Error;

mod fallback;
mod live;
mod simulated;

pub use fallback::FallbackClassifier;
pub use live::{strip_code_fence, AnimalAnalysis, LiveClassifier, LIVE_CONFIDENCE};
pub use simulated::{SimulatedClassifier, SIMULATED_CONFIDENCE};

pub use async_trait::async_trait;

/// Reasons a classifier could not produce a result.
///
/// Every variant means the classifier is unavailable for this request. The
/// engine absorbs these by falling back to simulation.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier credential is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Classifier returned an empty response")]
    EmptyResponse,

    #[error("Failed to parse classifier response: {0}")]
    Parse(String),

    #[error("Classifier did not detect any valid animal information")]
    NoFindings,
}

/// Capability that turns an image into condition tags
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify a single image
    async fn classify(&self, image: &ImagePayload) -> Result<ClassificationResult, ClassifierError>;

    /// Short strategy name used in logs
    fn name(&self) -> &str;
}
