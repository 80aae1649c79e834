use super::{ClassifierError, ImageClassifier};
use crate::model::{ClassificationResult, ConditionTag, ImagePayload};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Confidence reported for every simulated classification
pub const SIMULATED_CONFIDENCE: f32 = 0.5;

/// Local stand-in for the vision model.
///
/// Draws 2 or 3 distinct tags from the classifier vocabulary. Never fails.
pub struct SimulatedClassifier {
    rng: Mutex<StdRng>,
}

impl SimulatedClassifier {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible draws for a given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draw one simulated result
    pub fn draw(&self) -> ClassificationResult {
        let mut rng = self.rng.lock();
        let count = rng.gen_range(2..=3);
        let tags: Vec<ConditionTag> = ConditionTag::VOCABULARY
            .choose_multiple(&mut *rng, count)
            .copied()
            .collect();

        ClassificationResult::new(tags, SIMULATED_CONFIDENCE)
    }
}

impl Default for SimulatedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ImageClassifier for SimulatedClassifier {
    async fn classify(&self, _image: &ImagePayload) -> Result<ClassificationResult, ClassifierError> {
        let result = self.draw();
        debug!(tags = ?result.tags, "Simulated classification");
        Ok(result)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
