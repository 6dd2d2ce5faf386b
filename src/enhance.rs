use crate::error::EnhanceError;
use crate::event::AppEvent;
use crate::gallery::{store::GalleryStore, EnhancedImage};
use crate::media::InlinePayload;
use crate::session::EnhancementMode;
use crate::vision::VisionClient;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

const FINE_DINING_INSTRUCTION: &str = "Replate this exact dish as a fine-dining presentation: \
elegant plating on refined tableware, soft directional lighting, shallow depth of field, \
neutral upscale backdrop. Keep the food itself recognizably the same.";

const QUALITY_FIX_INSTRUCTION: &str = "Improve this photo of the dish without changing the \
plating: correct the white balance and exposure, sharpen the focus, lift the colors to look \
fresh and appetizing, and remove casual-snapshot artifacts.";

pub const STATUS_PHRASES: [&str; 5] = [
    "Plating your dish…",
    "Adjusting the lighting…",
    "Garnishing the details…",
    "Balancing the colors…",
    "Almost ready to serve…",
];

pub const STATUS_INTERVAL: Duration = Duration::from_millis(2400);

// The source is always the original upload; "try again" on a generated
// record passes that record's stored source.
#[derive(Debug, Clone)]
pub struct EnhanceRequest {
    pub mode: EnhancementMode,
    pub source: InlinePayload,
    pub reference: Option<InlinePayload>,
}

#[derive(Debug)]
pub struct EnhanceOutcome {
    pub record: EnhancedImage,
    pub all: Vec<EnhancedImage>,
}

fn fixed_instruction(mode: EnhancementMode) -> Option<&'static str> {
    match mode {
        EnhancementMode::FineDining => Some(FINE_DINING_INSTRUCTION),
        EnhancementMode::QualityFix => Some(QUALITY_FIX_INSTRUCTION),
        EnhancementMode::BrandStyle => None,
    }
}

// A failure at any step leaves the gallery untouched: the record is only
// built and inserted after the model has returned image data.
pub async fn run(
    client: &VisionClient,
    gallery: &GalleryStore,
    request: EnhanceRequest,
) -> Result<EnhancedImage, EnhanceError> {
    let instruction = match fixed_instruction(request.mode) {
        Some(template) => template.to_string(),
        None => {
            let Some(reference) = request.reference.as_ref() else {
                return Err(EnhanceError::Validation(
                    "add a reference photo for brand style".to_string(),
                ));
            };
            client.derive_style_instruction(reference).await?
        }
    };

    let image = client.transform_image(&request.source, &instruction).await?;
    let record = EnhancedImage::new(image, request.source.clone());
    gallery.insert(&record)?;
    info!(id = %record.id, mode = ?request.mode, "enhanced image persisted");
    Ok(record)
}

#[derive(Clone)]
pub struct Enhancer {
    client: Arc<VisionClient>,
    gallery: GalleryStore,
    tx: Sender<AppEvent>,
    runtime_handle: Handle,
}

impl Enhancer {
    pub fn new(
        client: Arc<VisionClient>,
        gallery: GalleryStore,
        tx: Sender<AppEvent>,
        runtime_handle: Handle,
    ) -> Self {
        Self {
            client,
            gallery,
            tx,
            runtime_handle,
        }
    }

    // The caller is responsible for re-entry gating; this only executes
    // what it is handed.
    pub fn spawn(&self, request: EnhanceRequest) {
        let client = Arc::clone(&self.client);
        let gallery = self.gallery.clone();
        let tx = self.tx.clone();
        let ticker_tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            let ticker = tokio::spawn(async move {
                let mut interval = tokio::time::interval(STATUS_INTERVAL);
                interval.tick().await;
                let mut index = 0;
                loop {
                    interval.tick().await;
                    index = (index + 1) % STATUS_PHRASES.len();
                    if ticker_tx.send(AppEvent::StatusTick(STATUS_PHRASES[index])).is_err() {
                        break;
                    }
                }
            });

            let result = match run(&client, &gallery, request).await {
                Ok(record) => gallery
                    .list_all()
                    .map(|all| EnhanceOutcome { record, all }),
                Err(err) => Err(err),
            };

            // aborted before reporting, so no tick lands after the run settles
            ticker.abort();
            let _ = tx.send(AppEvent::EnhanceFinished(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GarnishConfig;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> VisionClient {
        VisionClient::new(GarnishConfig {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            ..GarnishConfig::default()
        })
    }

    fn test_gallery() -> (tempfile::TempDir, GalleryStore) {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let store = GalleryStore::open(dir.path()).expect("store should open");
        (dir, store)
    }

    fn source_payload() -> InlinePayload {
        InlinePayload::from_bytes("image/jpeg", b"original upload")
    }

    fn image_response(bytes: &[u8]) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": { "mimeType": "image/png", "data": BASE64.encode(bytes) }
                    }]
                }
            }]
        })
    }

    fn text_response(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn fine_dining_run_persists_a_record_tracing_the_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response(b"plated")))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let source = source_payload();
        let record = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::FineDining,
                source: source.clone(),
                reference: None,
            },
        )
        .await
        .expect("run should succeed");

        assert_eq!(record.source, source);
        assert_eq!(record.image.mime_type, "image/png");
        let listed = gallery.list_all().expect("listing should succeed");
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn try_again_keeps_the_original_source_across_generations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response(b"take-two")))
            .expect(2)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let client = test_client(&server);
        let original = source_payload();

        let first = run(
            &client,
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::QualityFix,
                source: original.clone(),
                reference: None,
            },
        )
        .await
        .expect("first run should succeed");

        // "Try again" re-enhances using the record's stored source.
        let second = run(
            &client,
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::QualityFix,
                source: first.source.clone(),
                reference: None,
            },
        )
        .await
        .expect("second run should succeed");

        assert_eq!(second.source, original);
        assert_ne!(second.id, first.id);
        assert_eq!(gallery.list_all().expect("listing should succeed").len(), 2);
    }

    #[tokio::test]
    async fn brand_style_derives_an_instruction_before_transforming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
                "Moody slate backdrop with warm side lighting",
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .and(body_string_contains("Moody slate backdrop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response(b"branded")))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let record = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::BrandStyle,
                source: source_payload(),
                reference: Some(InlinePayload::from_bytes("image/png", b"brand look")),
            },
        )
        .await
        .expect("run should succeed");

        assert_eq!(record.source, source_payload());
    }

    #[tokio::test]
    async fn blank_style_derivation_stops_before_the_image_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("   ")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let err = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::BrandStyle,
                source: source_payload(),
                reference: Some(InlinePayload::from_bytes("image/png", b"brand look")),
            },
        )
        .await
        .expect_err("blank derivation should fail");

        assert!(matches!(err, EnhanceError::InstructionDerivation));
        assert!(gallery.list_all().expect("listing should succeed").is_empty());
    }

    #[tokio::test]
    async fn brand_style_without_a_reference_never_reaches_the_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let err = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::BrandStyle,
                source: source_payload(),
                reference: None,
            },
        )
        .await
        .expect_err("missing reference should fail");

        assert!(matches!(err, EnhanceError::Validation(_)));
    }

    #[tokio::test]
    async fn text_only_response_fails_and_commits_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response(
                "I cannot edit this photograph",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let err = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::FineDining,
                source: source_payload(),
                reference: None,
            },
        )
        .await
        .expect_err("text-only response should fail");

        assert!(matches!(err, EnhanceError::NoImageReturned));
        assert!(gallery.list_all().expect("listing should succeed").is_empty());
    }

    #[tokio::test]
    async fn service_failure_maps_to_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, gallery) = test_gallery();
        let err = run(
            &test_client(&server),
            &gallery,
            EnhanceRequest {
                mode: EnhancementMode::FineDining,
                source: source_payload(),
                reference: None,
            },
        )
        .await
        .expect_err("5xx should fail");

        assert!(matches!(err, EnhanceError::Transport(_)));
        assert!(gallery.list_all().expect("listing should succeed").is_empty());
    }
}
