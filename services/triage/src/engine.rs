use crate::classifier::{
    ClassifierError, FallbackClassifier, ImageClassifier, LiveClassifier, SimulatedClassifier,
};
use crate::config::ClassifierConfig;
use crate::model::{ConditionTag, Coordinates, ImagePayload, TriageResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Highest priority a report can receive
pub const MAX_PRIORITY: u8 = 5;

const BASE_PRIORITY: u8 = 1;
const INJURY_WEIGHT: u8 = 3;
const MALNOURISHMENT_WEIGHT: u8 = 2;

/// Errors surfaced by the triage operation
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),
}

impl From<ClassifierError> for TriageError {
    fn from(e: ClassifierError) -> Self {
        TriageError::ClassificationFailed(e.to_string())
    }
}

/// Turns an image and a position into a ranked triage record
pub struct TriageEngine {
    classifier: Arc<dyn ImageClassifier>,
    simulator: Arc<dyn ImageClassifier>,
}

impl TriageEngine {
    /// Engine over an arbitrary classifier; forced simulation uses a fresh
    /// [`SimulatedClassifier`]
    pub fn new(classifier: Arc<dyn ImageClassifier>) -> Self {
        Self {
            classifier,
            simulator: Arc::new(SimulatedClassifier::new()),
        }
    }

    /// Wire the classifier strategies from configuration.
    ///
    /// Live classification with simulated fallback when a credential is
    /// present and simulation is not forced, simulation only otherwise.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut builder = TriageEngineBuilder::new().force_simulation(config.force_simulation);
        if let Some(seed) = config.simulation_seed {
            builder = builder.simulation_seed(seed);
        }

        if config.live_enabled() {
            match LiveClassifier::new(config) {
                Ok(live) => {
                    info!(model = %live.model(), "Live classifier enabled with simulated fallback");
                    builder = builder.primary(Arc::new(live));
                }
                Err(e) => {
                    warn!(error = %e, "Live classifier could not be built, using simulation");
                }
            }
        } else if config.force_simulation {
            info!("Simulation forced by configuration");
        } else {
            info!("No classifier credential configured, using simulation");
        }

        builder.build()
    }

    /// Name of the configured classifier strategy
    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Triage a report with the configured classifier
    pub async fn triage(
        &self,
        image: &ImagePayload,
        coordinates: Coordinates,
    ) -> Result<TriageResult, TriageError> {
        self.triage_with(image, coordinates, false).await
    }

    /// Triage a report, optionally forcing simulation for this call only
    #[instrument(skip(self, image), fields(classifier = tracing::field::Empty))]
    pub async fn triage_with(
        &self,
        image: &ImagePayload,
        coordinates: Coordinates,
        force_simulation: bool,
    ) -> Result<TriageResult, TriageError> {
        let classifier = if force_simulation {
            &self.simulator
        } else {
            &self.classifier
        };
        tracing::Span::current().record("classifier", classifier.name());
        metrics::counter!("triage.requests").increment(1);

        let classification = classifier.classify(image).await?;
        if classification.tags.is_empty() {
            return Err(TriageError::ClassificationFailed(
                "classifier produced no tags".to_string(),
            ));
        }

        let triage_tags = normalize_species(classification.tags);
        let priority_score = priority_score(&triage_tags);
        let readable_address = format_address(&coordinates);

        debug!(
            tags = ?triage_tags,
            priority_score,
            confidence = classification.confidence,
            "Triage complete"
        );

        Ok(TriageResult {
            triage_tags,
            priority_score,
            readable_address,
        })
    }
}

/// Prepend [`ConditionTag::UnknownSpecies`] when neither `Dog` nor `Cat` is present
pub fn normalize_species(mut tags: Vec<ConditionTag>) -> Vec<ConditionTag> {
    if !tags.iter().any(ConditionTag::is_species) {
        tags.insert(0, ConditionTag::UnknownSpecies);
    }
    tags
}

/// Score tags as base 1, +3 for injury, +2 for malnourishment, capped at 5.
///
/// The reachable scores are 1, 3, 4 and 5.
pub fn priority_score(tags: &[ConditionTag]) -> u8 {
    let mut score = BASE_PRIORITY;

    if tags.contains(&ConditionTag::ApparentInjury) {
        score += INJURY_WEIGHT;
    }
    if tags.contains(&ConditionTag::Malnourished) {
        score += MALNOURISHMENT_WEIGHT;
    }

    score.min(MAX_PRIORITY)
}

/// Placeholder location text; coordinates rounded to four decimals
pub fn format_address(coordinates: &Coordinates) -> String {
    format!(
        "Near {}, {}",
        fixed_four(coordinates.latitude),
        fixed_four(coordinates.longitude)
    )
}

/// Four-decimal rendering with exact ties rounded away from zero.
///
/// A minus sign is only written for values below zero, so `-0.0` renders
/// as `0.0000` while `-0.00001` renders as `-0.0000`.
fn fixed_four(value: f64) -> String {
    let magnitude = value.abs();

    // `{:.N}` prints the exact binary value; a tie has exactly five decimals
    let exact = format!("{:.40}", magnitude);
    let decimals = exact.split_once('.').map_or("", |(_, d)| d);
    let is_tie = decimals.as_bytes().get(4) == Some(&b'5')
        && decimals.bytes().skip(5).all(|b| b == b'0');

    // `{:.4}` alone breaks ties toward even
    let rounded = if is_tie {
        format!("{:.4}", magnitude + 0.00005)
    } else {
        format!("{:.4}", magnitude)
    };

    if value < 0.0 {
        format!("-{}", rounded)
    } else {
        rounded
    }
}

/// Builder for assembling a [`TriageEngine`] from individual strategies
pub struct TriageEngineBuilder {
    primary: Option<Arc<dyn ImageClassifier>>,
    simulation_seed: Option<u64>,
    force_simulation: bool,
}

impl TriageEngineBuilder {
    pub fn new() -> Self {
        Self {
            primary: None,
            simulation_seed: None,
            force_simulation: false,
        }
    }

    /// Classifier tried first; the simulator covers its failures
    pub fn primary(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.primary = Some(classifier);
        self
    }

    pub fn simulation_seed(mut self, seed: u64) -> Self {
        self.simulation_seed = Some(seed);
        self
    }

    pub fn force_simulation(mut self, enabled: bool) -> Self {
        self.force_simulation = enabled;
        self
    }

    pub fn build(self) -> TriageEngine {
        let simulator: Arc<dyn ImageClassifier> = match self.simulation_seed {
            Some(seed) => Arc::new(SimulatedClassifier::with_seed(seed)),
            None => Arc::new(SimulatedClassifier::new()),
        };

        let classifier: Arc<dyn ImageClassifier> = match self.primary {
            Some(primary) if !self.force_simulation => {
                Arc::new(FallbackClassifier::new(primary, simulator.clone()))
            }
            _ => simulator.clone(),
        };

        TriageEngine {
            classifier,
            simulator,
        }
    }
}

impl Default for TriageEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{MockImageClassifier, SIMULATED_CONFIDENCE};
    use crate::model::ClassificationResult;
    use ConditionTag::*;

    fn fixed(tags: Vec<ConditionTag>) -> Arc<dyn ImageClassifier> {
        let mut mock = MockImageClassifier::new();
        mock.expect_classify()
            .returning(move |_| Ok(ClassificationResult::new(tags.clone(), 0.85)));
        mock.expect_name().return_const("fixed".to_string());
        Arc::new(mock)
    }

    fn image() -> ImagePayload {
        ImagePayload::from("AAAA")
    }

    #[test]
    fn test_normalize_adds_sentinel_in_front() {
        assert_eq!(
            normalize_species(vec![Malnourished, WearingCollar]),
            vec![UnknownSpecies, Malnourished, WearingCollar]
        );
        assert_eq!(normalize_species(vec![]), vec![UnknownSpecies]);
    }

    #[test]
    fn test_normalize_keeps_tags_with_species() {
        assert_eq!(
            normalize_species(vec![ApparentInjury, Cat]),
            vec![ApparentInjury, Cat]
        );
        assert_eq!(normalize_species(vec![Dog]), vec![Dog]);
    }

    #[test]
    fn test_priority_scores() {
        assert_eq!(priority_score(&[Dog]), 1);
        assert_eq!(priority_score(&[Dog, WearingCollar]), 1);
        assert_eq!(priority_score(&[UnknownSpecies, Malnourished]), 3);
        assert_eq!(priority_score(&[Dog, ApparentInjury]), 4);
        assert_eq!(priority_score(&[Cat, ApparentInjury, Malnourished]), 5);
    }

    #[test]
    fn test_priority_never_two_and_bounded() {
        let vocabulary = ConditionTag::VOCABULARY;
        for mask in 0u32..(1 << vocabulary.len()) {
            let tags: Vec<_> = vocabulary
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << *i) != 0)
                .map(|(_, t)| *t)
                .collect();
            let score = priority_score(&tags);
            assert!([1, 3, 4, 5].contains(&score), "{:?} scored {}", tags, score);

            for extra in [ApparentInjury, Malnourished] {
                let mut more = tags.clone();
                more.push(extra);
                assert!(priority_score(&more) >= score);
            }
        }
    }

    #[test]
    fn test_format_address_rounds_to_four_decimals() {
        assert_eq!(
            format_address(&Coordinates::new(37.42199999, -122.084)),
            "Near 37.4220, -122.0840"
        );
        assert_eq!(
            format_address(&Coordinates::new(40.7128, -74.0060)),
            "Near 40.7128, -74.0060"
        );
        assert_eq!(format_address(&Coordinates::new(0.0, 0.0)), "Near 0.0000, 0.0000");
    }

    #[test]
    fn test_format_address_rounds_ties_away_from_zero() {
        assert_eq!(
            format_address(&Coordinates::new(12.03125, -0.03125)),
            "Near 12.0313, -0.0313"
        );
        // Neither literal is an exact tie once stored as a double
        assert_eq!(
            format_address(&Coordinates::new(45.99995, 2.00005)),
            "Near 45.9999, 2.0000"
        );
        assert_eq!(
            format_address(&Coordinates::new(1.00005, 0.00005)),
            "Near 1.0001, 0.0001"
        );
    }

    #[test]
    fn test_format_address_sign_of_zero() {
        assert_eq!(
            format_address(&Coordinates::new(-0.0, 0.0)),
            "Near 0.0000, 0.0000"
        );
        assert_eq!(
            format_address(&Coordinates::new(-0.00001, 10.0)),
            "Near -0.0000, 10.0000"
        );
    }

    #[tokio::test]
    async fn test_dog_with_injury() {
        let engine = TriageEngine::new(fixed(vec![Dog, ApparentInjury]));
        let result = engine
            .triage(&image(), Coordinates::new(40.7128, -74.0060))
            .await
            .unwrap();

        assert_eq!(result.priority_score, 4);
        assert_eq!(result.triage_tags, vec![Dog, ApparentInjury]);
        assert_eq!(result.readable_address, "Near 40.7128, -74.0060");
    }

    #[tokio::test]
    async fn test_malnourished_without_species() {
        let engine = TriageEngine::new(fixed(vec![Malnourished]));
        let result = engine
            .triage(&image(), Coordinates::new(1.0, 2.0))
            .await
            .unwrap();

        assert_eq!(result.triage_tags, vec![UnknownSpecies, Malnourished]);
        assert_eq!(result.priority_score, 3);
    }

    #[tokio::test]
    async fn test_cat_injured_and_malnourished_is_capped() {
        let engine = TriageEngine::new(fixed(vec![Cat, ApparentInjury, Malnourished]));
        let result = engine
            .triage(&image(), Coordinates::new(1.0, 2.0))
            .await
            .unwrap();
        assert_eq!(result.priority_score, 5);
    }

    #[tokio::test]
    async fn test_live_failure_falls_back_to_simulation() {
        let mut live = MockImageClassifier::new();
        live.expect_classify()
            .times(1)
            .returning(|_| Err(ClassifierError::Network("connection refused".to_string())));
        live.expect_name().return_const("live".to_string());

        let engine = TriageEngineBuilder::new()
            .primary(Arc::new(live))
            .simulation_seed(3)
            .build();

        let result = engine
            .triage(&image(), Coordinates::new(10.0, 20.0))
            .await
            .unwrap();
        assert!([1, 3, 4, 5].contains(&result.priority_score));
        assert!(!result.triage_tags.is_empty());
    }

    #[tokio::test]
    async fn test_forced_simulation_never_calls_primary() {
        let mut live = MockImageClassifier::new();
        live.expect_classify().never();
        live.expect_name().return_const("live".to_string());
        let live: Arc<dyn ImageClassifier> = Arc::new(live);

        let engine = TriageEngineBuilder::new()
            .primary(live.clone())
            .force_simulation(true)
            .build();
        assert_eq!(engine.classifier_name(), "simulated");
        engine.triage(&image(), Coordinates::new(0.0, 0.0)).await.unwrap();

        let engine = TriageEngineBuilder::new().primary(live).build();
        engine
            .triage_with(&image(), Coordinates::new(0.0, 0.0), true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_forced_simulation_result_shape() {
        let simulator = SimulatedClassifier::with_seed(11);
        for _ in 0..50 {
            let result = simulator.classify(&image()).await.unwrap();
            assert!((2..=3).contains(&result.tags.len()));
            assert_eq!(result.confidence, SIMULATED_CONFIDENCE);
        }
    }

    #[tokio::test]
    async fn test_empty_tags_is_classification_failure() {
        let engine = TriageEngine::new(fixed(vec![]));
        assert!(matches!(
            engine.triage(&image(), Coordinates::new(0.0, 0.0)).await,
            Err(TriageError::ClassificationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_total_failure_propagates() {
        let mut broken = MockImageClassifier::new();
        broken
            .expect_classify()
            .returning(|_| Err(ClassifierError::NoFindings));
        broken.expect_name().return_const("broken".to_string());

        let engine = TriageEngine::new(Arc::new(broken));
        assert!(matches!(
            engine.triage(&image(), Coordinates::new(0.0, 0.0)).await,
            Err(TriageError::ClassificationFailed(_))
        ));
    }

    #[test]
    fn test_from_config_without_key_uses_simulation() {
        let engine = TriageEngine::from_config(&ClassifierConfig::default());
        assert_eq!(engine.classifier_name(), "simulated");
    }

    #[test]
    fn test_from_config_with_key_uses_live_first() {
        let config = ClassifierConfig {
            api_key: Some("gsk_test".to_string()),
            ..Default::default()
        };
        let engine = TriageEngine::from_config(&config);
        assert_eq!(engine.classifier_name(), "live");
    }

    #[tokio::test]
    async fn test_from_config_forced_simulation_ignores_key() {
        let config = ClassifierConfig {
            api_key: Some("gsk_test".to_string()),
            simulation_seed: Some(11),
            ..ClassifierConfig::simulated()
        };
        let engine = TriageEngine::from_config(&config);
        assert_eq!(engine.classifier_name(), "simulated");

        let result = engine
            .triage(&image(), Coordinates::new(1.0, 1.0))
            .await
            .unwrap();
        assert!([1, 3, 4, 5].contains(&result.priority_score));
    }
}
