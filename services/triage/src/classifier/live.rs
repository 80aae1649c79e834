use super::{ClassifierError, ImageClassifier};
use crate::config::ClassifierConfig;
use crate::model::{ClassificationResult, ConditionTag, ImagePayload};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Confidence reported for every live classification
pub const LIVE_CONFIDENCE: f32 = 0.85;

const USER_AGENT: &str = concat!("pawtrack-triage/", env!("CARGO_PKG_VERSION"));

const ANALYSIS_PROMPT: &str = "Analyze this image of an animal. Identify: \
1) Animal type (Dog or Cat), 2) If there are visible injuries, \
3) If the animal appears malnourished/thin, 4) If the animal is wearing a collar. \
Respond ONLY with a valid JSON object in this exact format: \
{\"animalType\": \"Dog\" or \"Cat\", \"hasInjury\": true or false, \
\"isMalnourished\": true or false, \"hasCollar\": true or false}";

/// Vision model classifier speaking the OpenAI-compatible chat completions API
pub struct LiveClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LiveClassifier {
    /// Build a live classifier; fails when no credential is configured
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ClassifierError::NotConfigured)?
            .to_string();

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, image: &ImagePayload) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: ANALYSIS_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_uri(),
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait::async_trait]
impl ImageClassifier for LiveClassifier {
    #[instrument(skip(self, image), fields(model = %self.model))]
    async fn classify(&self, image: &ImagePayload) -> Result<ClassificationResult, ClassifierError> {
        let started = Instant::now();

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(image))
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Vision API returned an error status");
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClassifierError::EmptyResponse)?;

        let analysis = AnimalAnalysis::parse(&content)?;
        let tags = analysis.to_tags();

        if tags.is_empty() {
            return Err(ClassifierError::NoFindings);
        }

        metrics::histogram!("triage.classifier.live.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        debug!(
            tags = ?tags,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Live classification complete"
        );

        Ok(ClassificationResult::new(tags, LIVE_CONFIDENCE))
    }

    fn name(&self) -> &str {
        "live"
    }
}

/// Structured verdict expected back from the vision model.
///
/// Unknown fields are ignored and missing fields count as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalAnalysis {
    #[serde(default)]
    pub animal_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub has_injury: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_malnourished: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub has_collar: bool,
}

impl AnimalAnalysis {
    /// Parse model output, tolerating a surrounding markdown code fence
    pub fn parse(content: &str) -> Result<Self, ClassifierError> {
        serde_json::from_str(strip_code_fence(content))
            .map_err(|e| ClassifierError::Parse(e.to_string()))
    }

    /// Map the verdict onto condition tags: species, injury, malnourishment, collar
    pub fn to_tags(&self) -> Vec<ConditionTag> {
        let mut tags = Vec::with_capacity(4);

        match self.animal_type.as_deref().map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("dog") => tags.push(ConditionTag::Dog),
            Some(t) if t.eq_ignore_ascii_case("cat") => tags.push(ConditionTag::Cat),
            _ => {}
        }
        if self.has_injury {
            tags.push(ConditionTag::ApparentInjury);
        }
        if self.is_malnourished {
            tags.push(ConditionTag::Malnourished);
        }
        if self.has_collar {
            tags.push(ConditionTag::WearingCollar);
        }

        tags
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and its closing marker
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);

    rest.trim()
}

/// Accept `true`/`false` as JSON booleans or strings; anything else is false
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Flag::Other(_)) | None => false,
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
