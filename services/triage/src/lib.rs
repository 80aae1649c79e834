//! Pawtrack Triage - decision pipeline for stray animal reports
//!
//! Turns a photo and a GPS position into a ranked triage record:
//!
//! - Condition tags from an image classifier (a live vision model, with a
//!   local simulated classifier standing in when the model is unreachable)
//! - A 1-5 priority score derived from the tags
//! - A human-readable location string
//!
//! # Example
//!
//! ```rust,no_run
//! use pawtrack_triage::{ClassifierConfig, Coordinates, ImagePayload, TriageEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClassifierConfig::from_env()?;
//!     let engine = TriageEngine::from_config(&config);
//!
//!     let image = ImagePayload::from("data:image/jpeg;base64,/9j/4AAQ...");
//!     let result = engine.triage(&image, Coordinates::new(40.7128, -74.0060)).await?;
//!     println!("priority {}", result.priority_score);
//!
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod model;

// Re-export main types
pub use classifier::{
    ClassifierError, FallbackClassifier, ImageClassifier, LiveClassifier, SimulatedClassifier,
};
pub use config::{ClassifierConfig, ConfigError};
pub use engine::{
    format_address, normalize_species, priority_score, TriageEngine, TriageEngineBuilder,
    TriageError, MAX_PRIORITY,
};
pub use model::{ClassificationResult, ConditionTag, Coordinates, ImagePayload, TriageResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::classifier::{async_trait, ClassifierError, ImageClassifier};
    pub use crate::config::ClassifierConfig;
    pub use crate::engine::{TriageEngine, TriageEngineBuilder, TriageError};
    pub use crate::model::{
        ClassificationResult, ConditionTag, Coordinates, ImagePayload, TriageResult,
    };
}
