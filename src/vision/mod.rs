//! Client for the generative model endpoint.
//!
//! Two calls exist: deriving a style instruction from a reference photo
//! (text response) and transforming the dish photo (image response). Both
//! post an ordered list of parts (inline binary with a media type, or plain
//! text) and read back candidates carrying the same part shapes. The
//! service is treated as opaque: no retry, no backoff, no streaming.

use crate::config::GarnishConfig;
use crate::error::EnhanceError;
use crate::media::InlinePayload;
use serde::Deserialize;
use serde_json::{json, Value};

/// Meta-instruction for the style-derivation call. The model's textual
/// answer becomes the transformation instruction for the brand-style mode.
const STYLE_META_INSTRUCTION: &str = "Study this reference food photograph and describe, \
as one concise imperative instruction for an image model, how to restyle another dish \
photo so it matches this look: lighting, color grading, plating, props and backdrop. \
Reply with the instruction only.";

#[derive(Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    config: GarnishConfig,
}

impl VisionClient {
    pub fn new(config: GarnishConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Ask the text-capable model to describe the reference photo's style.
    pub async fn derive_style_instruction(
        &self,
        reference: &InlinePayload,
    ) -> Result<String, EnhanceError> {
        let parts = vec![inline_part(reference), text_part(STYLE_META_INSTRUCTION)];
        let response = self
            .generate(&self.config.text_model, parts, false)
            .await?;

        match response.first_text() {
            Some(instruction) if !instruction.trim().is_empty() => {
                Ok(instruction.trim().to_string())
            }
            _ => Err(EnhanceError::InstructionDerivation),
        }
    }

    /// Send the source photo and an instruction to the image-capable model.
    ///
    /// Succeeds only when the response carries image data; a text-only
    /// response is a [`EnhanceError::NoImageReturned`] failure.
    pub async fn transform_image(
        &self,
        source: &InlinePayload,
        instruction: &str,
    ) -> Result<InlinePayload, EnhanceError> {
        let parts = vec![inline_part(source), text_part(instruction)];
        let response = self
            .generate(&self.config.image_model, parts, true)
            .await?;

        response.first_image().ok_or(EnhanceError::NoImageReturned)
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<Value>,
        want_image: bool,
    ) -> Result<GenerateResponse, EnhanceError> {
        if self.config.api_key.trim().is_empty() {
            return Err(EnhanceError::Transport(
                "no API key configured (set GARNISH_API_KEY or edit config.toml)".to_string(),
            ));
        }

        let url = format!(
            "{}/v1beta/models/{model}:generateContent",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_generate_request(parts, want_image);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| EnhanceError::transport("request failed", err))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EnhanceError::Transport(format!(
                "{model} returned {status}: {}",
                summarize_body(&detail)
            )));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|err| EnhanceError::transport("malformed response", err))
    }
}

fn inline_part(payload: &InlinePayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": payload.mime_type,
            "data": payload.data,
        }
    })
}

fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

fn build_generate_request(parts: Vec<Value>, want_image: bool) -> Value {
    let mut body = json!({
        "contents": [{ "parts": parts }],
    });
    if want_image {
        body["generationConfig"] = json!({ "responseModalities": ["IMAGE", "TEXT"] });
    }
    body
}

/// First line of an error body, clipped so failures stay readable in the UI.
fn summarize_body(body: &str) -> String {
    body.lines().next().unwrap_or("").chars().take(200).collect()
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|candidate| candidate.content.as_ref())
            .flat_map(|content| content.parts.iter())
    }

    fn first_text(&self) -> Option<&str> {
        self.parts().find_map(|part| part.text.as_deref())
    }

    fn first_image(&self) -> Option<InlinePayload> {
        self.parts()
            .find_map(|part| part.inline_data.as_ref())
            .map(|inline| InlinePayload {
                mime_type: inline.mime_type.clone(),
                data: inline.data.clone(),
            })
    }
}
