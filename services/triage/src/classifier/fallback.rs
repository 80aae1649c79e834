use super::{ClassifierError, ImageClassifier};
use crate::model::{ClassificationResult, ImagePayload};
use std::sync::Arc;
use tracing::warn;

/// Runs the primary classifier and substitutes the secondary one on failure.
///
/// No retries: a single failed primary attempt goes straight to the
/// secondary. Only a failure of the secondary is returned to the caller.
pub struct FallbackClassifier {
    primary: Arc<dyn ImageClassifier>,
    secondary: Arc<dyn ImageClassifier>,
}

impl FallbackClassifier {
    pub fn new(primary: Arc<dyn ImageClassifier>, secondary: Arc<dyn ImageClassifier>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait::async_trait]
impl ImageClassifier for FallbackClassifier {
    async fn classify(&self, image: &ImagePayload) -> Result<ClassificationResult, ClassifierError> {
        match self.primary.classify(image).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "Primary classifier unavailable, falling back"
                );
                metrics::counter!("triage.classifier.fallbacks").increment(1);
                self.secondary.classify(image).await
            }
        }
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}
