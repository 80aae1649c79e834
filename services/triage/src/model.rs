//! Data types shared by the classifier strategies and the triage engine.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete observation about the animal's species or state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionTag {
    #[serde(rename = "Dog")]
    Dog,
    #[serde(rename = "Cat")]
    Cat,
    #[serde(rename = "Apparent Injury")]
    ApparentInjury,
    #[serde(rename = "Malnourished")]
    Malnourished,
    #[serde(rename = "Lost/Wearing Collar")]
    WearingCollar,
    /// Placed in front of the tags when neither `Dog` nor `Cat` was detected
    #[serde(rename = "Neither Dog nor Cat", alias = "Niether Dog nor Cat")]
    UnknownSpecies,
}

impl ConditionTag {
    /// Tags a classifier may report. `UnknownSpecies` is only ever added by
    /// species normalization.
    pub const VOCABULARY: [ConditionTag; 5] = [
        ConditionTag::Dog,
        ConditionTag::Cat,
        ConditionTag::ApparentInjury,
        ConditionTag::Malnourished,
        ConditionTag::WearingCollar,
    ];

    /// Dashboard label
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionTag::Dog => "Dog",
            ConditionTag::Cat => "Cat",
            ConditionTag::ApparentInjury => "Apparent Injury",
            ConditionTag::Malnourished => "Malnourished",
            ConditionTag::WearingCollar => "Lost/Wearing Collar",
            ConditionTag::UnknownSpecies => "Neither Dog nor Cat",
        }
    }

    /// Parse a dashboard label, including the legacy sentinel spelling
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Dog" => Some(ConditionTag::Dog),
            "Cat" => Some(ConditionTag::Cat),
            "Apparent Injury" => Some(ConditionTag::ApparentInjury),
            "Malnourished" => Some(ConditionTag::Malnourished),
            "Lost/Wearing Collar" => Some(ConditionTag::WearingCollar),
            "Neither Dog nor Cat" | "Niether Dog nor Cat" => Some(ConditionTag::UnknownSpecies),
            _ => None,
        }
    }

    pub fn is_species(&self) -> bool {
        matches!(self, ConditionTag::Dog | ConditionTag::Cat)
    }
}

impl fmt::Display for ConditionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS position of a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both values finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Raw output of an image classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Observed tags, in the order the classifier reported them
    pub tags: Vec<ConditionTag>,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(tags: Vec<ConditionTag>, confidence: f32) -> Self {
        Self {
            tags,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Final output of the triage engine, ready to be attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    pub triage_tags: Vec<ConditionTag>,
    /// Always one of 1, 3, 4 or 5
    pub priority_score: u8,
    pub readable_address: String,
}

/// Image submitted with a report
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// Base64 text, optionally already a `data:` URI
    Encoded(String),
    /// Raw image bytes
    Bytes(Vec<u8>),
}

impl ImagePayload {
    pub fn is_empty(&self) -> bool {
        match self {
            ImagePayload::Encoded(s) => s.trim().is_empty(),
            ImagePayload::Bytes(b) => b.is_empty(),
        }
    }

    /// Render the image as a `data:` URI suitable for a vision model request
    pub fn to_data_uri(&self) -> String {
        match self {
            ImagePayload::Encoded(s) if s.starts_with("data:") => s.clone(),
            ImagePayload::Encoded(s) => format!("data:image/jpeg;base64,{}", s),
            ImagePayload::Bytes(bytes) => {
                format!("data:{};base64,{}", sniff_mime(bytes), BASE64.encode(bytes))
            }
        }
    }
}

impl From<String> for ImagePayload {
    fn from(s: String) -> Self {
        ImagePayload::Encoded(s)
    }
}

impl From<&str> for ImagePayload {
    fn from(s: &str) -> Self {
        ImagePayload::Encoded(s.to_string())
    }
}

impl From<Vec<u8>> for ImagePayload {
    fn from(bytes: Vec<u8>) -> Self {
        ImagePayload::Bytes(bytes)
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}
